//! Read-only reference catalogs (exams, service locations, agreements).
//!
//! Kits only ever hold ids into these catalogs. The engine looks entries up to
//! prove a reference exists before writing it.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

use std::sync::Arc;

use labops_catalogs::{Agreement, Exam, ServiceLocation};

pub use in_memory::InMemoryCatalog;
pub use postgres::{PgCatalog, PgCatalogEntry};
pub use r#trait::{Catalog, CatalogError};

/// The three catalogs a kit can reference.
#[derive(Clone)]
pub struct ReferenceCatalogs {
    pub exams: Arc<dyn Catalog<Exam>>,
    pub locations: Arc<dyn Catalog<ServiceLocation>>,
    pub agreements: Arc<dyn Catalog<Agreement>>,
}

impl ReferenceCatalogs {
    pub fn new(
        exams: Arc<dyn Catalog<Exam>>,
        locations: Arc<dyn Catalog<ServiceLocation>>,
        agreements: Arc<dyn Catalog<Agreement>>,
    ) -> Self {
        Self {
            exams,
            locations,
            agreements,
        }
    }

    /// Catalogs backed by the given Postgres pool.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            exams: Arc::new(PgCatalog::<Exam>::new(pool.clone())),
            locations: Arc::new(PgCatalog::<ServiceLocation>::new(pool.clone())),
            agreements: Arc::new(PgCatalog::<Agreement>::new(pool)),
        }
    }
}
