//! Postgres-backed catalog lookups.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use labops_catalogs::{Agreement, CatalogEntry, Exam, ServiceLocation};
use labops_core::{AgreementId, ExamId, LocationId};

use super::r#trait::{Catalog, CatalogError};

/// Table mapping for a catalog entry type.
pub trait PgCatalogEntry: CatalogEntry {
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn id_uuid(id: Self::Id) -> uuid::Uuid;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}

impl PgCatalogEntry for Exam {
    const TABLE: &'static str = "exams";
    const COLUMNS: &'static str = "id, code, name";

    fn id_uuid(id: ExamId) -> uuid::Uuid {
        id.into()
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Exam {
            id: ExamId::from_uuid(row.try_get("id")?),
            code: row.try_get("code")?,
            name: row.try_get("name")?,
        })
    }
}

impl PgCatalogEntry for ServiceLocation {
    const TABLE: &'static str = "service_locations";
    const COLUMNS: &'static str = "id, name";

    fn id_uuid(id: LocationId) -> uuid::Uuid {
        id.into()
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(ServiceLocation {
            id: LocationId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
        })
    }
}

impl PgCatalogEntry for Agreement {
    const TABLE: &'static str = "agreements";
    const COLUMNS: &'static str = "id, name";

    fn id_uuid(id: AgreementId) -> uuid::Uuid {
        id.into()
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Agreement {
            id: AgreementId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
        })
    }
}

/// Postgres-backed catalog for one entry type.
pub struct PgCatalog<E> {
    pool: Arc<PgPool>,
    _entry: PhantomData<fn() -> E>,
}

impl<E> PgCatalog<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            _entry: PhantomData,
        }
    }
}

#[async_trait]
impl<E: PgCatalogEntry> Catalog<E> for PgCatalog<E> {
    #[instrument(skip(self), fields(catalog = E::TABLE, id = %id), err)]
    async fn find_by_id(&self, id: E::Id) -> Result<Option<E>, CatalogError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", E::COLUMNS, E::TABLE);
        let row = sqlx::query(&sql)
            .bind(E::id_uuid(id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("lookup in {} failed: {e}", E::TABLE)))?;
        row.as_ref()
            .map(E::from_row)
            .transpose()
            .map_err(|e| CatalogError::Unavailable(format!("failed to decode {} row: {e}", E::TABLE)))
    }
}
