//! Infrastructure layer: kit storage, catalog lookups, transactions and the kit service.

pub mod catalog;
pub mod child_sync;
pub mod config;
pub mod error;
pub mod kit_service;
pub mod kit_store;
pub mod referential;
pub mod transaction;


pub use catalog::{Catalog, CatalogError, InMemoryCatalog, PgCatalog, ReferenceCatalogs};
pub use config::{StoreBackend, StoreConfig};
pub use error::KitError;
pub use kit_service::KitService;
pub use kit_store::{InMemoryKitStore, KitFilter, KitStore, KitStoreError, KitTransaction, PgKitStore};
pub use transaction::{TxState, UnitOfWork};
