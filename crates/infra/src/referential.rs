//! Referential validation against the reference catalogs.

use tracing::debug;

use labops_catalogs::CatalogEntry;

use crate::catalog::Catalog;
use crate::error::KitError;

/// Resolve `id` in `catalog`, or fail with `NotFound` naming the reference kind.
///
/// Read-only. A catalog backend failure surfaces as a storage error.
pub async fn resolve<E: CatalogEntry>(
    catalog: &dyn Catalog<E>,
    id: E::Id,
) -> Result<E, KitError> {
    match catalog.find_by_id(id).await? {
        Some(entry) => Ok(entry),
        None => {
            debug!(kind = %E::KIND, %id, "unresolved reference");
            Err(KitError::not_found(E::KIND.as_str(), id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, InMemoryCatalog};
    use async_trait::async_trait;
    use labops_catalogs::{Agreement, ServiceLocation};
    use labops_core::{AgreementId, LocationId};

    struct Unavailable;

    #[async_trait]
    impl Catalog<Agreement> for Unavailable {
        async fn find_by_id(&self, _id: AgreementId) -> Result<Option<Agreement>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn resolves_existing_entry() {
        let location = ServiceLocation::new(LocationId::new(), "Downtown unit");
        let catalog = InMemoryCatalog::with_entries([location.clone()]);

        let found = resolve(&catalog, location.id).await.unwrap();
        assert_eq!(found, location);
    }

    #[tokio::test]
    async fn missing_entry_is_not_found_with_kind_and_id() {
        let catalog = InMemoryCatalog::<ServiceLocation>::new();
        let id = LocationId::new();

        let err = resolve(&catalog, id).await.unwrap_err();
        assert_eq!(err, KitError::not_found("location", id));
    }

    #[tokio::test]
    async fn backend_failure_is_storage_error() {
        let err = resolve(&Unavailable, AgreementId::new()).await.unwrap_err();
        assert!(matches!(err, KitError::Storage(_)));
    }
}
