use async_trait::async_trait;
use thiserror::Error;

use labops_catalogs::CatalogEntry;

/// Catalog lookup failure (the catalog could not be read at all).
///
/// A missing entry is not an error; lookups return `Ok(None)` for that.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Lookup port for one reference catalog.
#[async_trait]
pub trait Catalog<E: CatalogEntry>: Send + Sync {
    async fn find_by_id(&self, id: E::Id) -> Result<Option<E>, CatalogError>;
}
