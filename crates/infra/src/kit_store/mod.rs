//! Kit persistence boundary.
//!
//! A kit is one root row plus three child tables. The port exposes reads over
//! committed state and a transaction handle for multi-row writes, so the
//! service can keep a kit and its children consistent.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryKitStore, InMemoryKitTransaction, TableSizes};
pub use postgres::{PgKitStore, PgKitTransaction};
pub use r#trait::{KitFilter, KitStore, KitStoreError, KitTransaction};
