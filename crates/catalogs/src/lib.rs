//! Reference catalogs consumed by kits (exams, service locations, agreements).
//!
//! These records are owned by other back-office modules. Kits only ever hold
//! their identifiers; this crate gives them a typed shape for lookups.

pub mod entry;

pub use entry::{Agreement, CatalogEntry, Exam, ReferenceKind, ServiceLocation};
