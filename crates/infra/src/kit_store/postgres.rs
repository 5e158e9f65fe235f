//! Postgres-backed kit store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | KitStoreError |
//! |------------|----------------------|---------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` (constraint name preserved) |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / RowNotFound / Other | N/A | `Backend` |
//!
//! Child rows carry a `row_seq` so exams without an `insertion_order` come back
//! in the order they were written.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use labops_catalogs::ReferenceKind;
use labops_core::{AgreementId, CompanyId, ExamId, KitId, LocationId};
use labops_kits::{Kit, KitAgreement, KitChildren, KitExam, KitLocation, KitStatus};

use super::r#trait::{KitFilter, KitStore, KitStoreError, KitTransaction};

const KIT_COLUMNS: &str = "id, code, name, description, status, company_id, \
     default_delivery_days, total_value, selling_price, created_at, updated_at";

/// Postgres-backed kit store.
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
/// Every transaction holds one pooled connection until commit or rollback.
#[derive(Debug, Clone)]
pub struct PgKitStore {
    pool: Arc<PgPool>,
}

impl PgKitStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), KitStoreError> {
        tracing::info!("running kit store migrations");
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| KitStoreError::backend(format!("migration failed: {e}")))
    }

    async fn fetch_kits(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Kit>, KitStoreError> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_kits", e))?;
        rows.iter().map(decode_kit).collect()
    }
}

#[async_trait]
impl KitStore for PgKitStore {
    type Tx = PgKitTransaction;

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Self::Tx, KitStoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgKitTransaction { tx })
    }

    #[instrument(skip(self), fields(kit_id = %id), err)]
    async fn find_kit(&self, id: KitId) -> Result<Option<Kit>, KitStoreError> {
        let row = sqlx::query(&format!("SELECT {KIT_COLUMNS} FROM kits WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_kit", e))?;
        row.as_ref().map(decode_kit).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_kit_by_code(&self, code: &str) -> Result<Option<Kit>, KitStoreError> {
        let row = sqlx::query(&format!("SELECT {KIT_COLUMNS} FROM kits WHERE code = $1"))
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_kit_by_code", e))?;
        row.as_ref().map(decode_kit).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_kits(&self, filter: KitFilter) -> Result<Vec<Kit>, KitStoreError> {
        match filter {
            KitFilter::All => {
                let sql = format!("SELECT {KIT_COLUMNS} FROM kits ORDER BY name, id");
                self.fetch_kits(sqlx::query(&sql)).await
            }
            KitFilter::Status(status) => {
                let sql =
                    format!("SELECT {KIT_COLUMNS} FROM kits WHERE status = $1 ORDER BY name, id");
                self.fetch_kits(sqlx::query(&sql).bind(status.as_str())).await
            }
            KitFilter::Location(location_id) => {
                let sql = format!(
                    "SELECT {KIT_COLUMNS} FROM kits k WHERE EXISTS (\
                     SELECT 1 FROM kit_locations l WHERE l.kit_id = k.id AND l.location_id = $1) \
                     ORDER BY name, id"
                );
                self.fetch_kits(sqlx::query(&sql).bind(location_id.as_uuid()))
                    .await
            }
            KitFilter::Agreement(agreement_id) => {
                let sql = format!(
                    "SELECT {KIT_COLUMNS} FROM kits k WHERE EXISTS (\
                     SELECT 1 FROM kit_agreements a WHERE a.kit_id = k.id AND a.agreement_id = $1) \
                     ORDER BY name, id"
                );
                self.fetch_kits(sqlx::query(&sql).bind(agreement_id.as_uuid()))
                    .await
            }
        }
    }

    #[instrument(skip(self), fields(kit_id = %id), err)]
    async fn load_children(&self, id: KitId) -> Result<KitChildren, KitStoreError> {
        let exams = sqlx::query(
            r#"
            SELECT kit_id, exam_id, quantity, insertion_order, notes
            FROM kit_exams
            WHERE kit_id = $1
            ORDER BY insertion_order ASC NULLS LAST, row_seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_exams", e))?;

        let locations = sqlx::query(
            "SELECT kit_id, location_id FROM kit_locations WHERE kit_id = $1 ORDER BY row_seq",
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_locations", e))?;

        let agreements = sqlx::query(
            "SELECT kit_id, agreement_id FROM kit_agreements WHERE kit_id = $1 ORDER BY row_seq",
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_agreements", e))?;

        Ok(KitChildren {
            exams: decode_rows::<KitExamRow, _>(&exams)?,
            locations: decode_rows::<KitLocationRow, _>(&locations)?,
            agreements: decode_rows::<KitAgreementRow, _>(&agreements)?,
        })
    }

    #[instrument(skip(self, kit), fields(kit_id = %kit.id), err)]
    async fn save_kit(&self, kit: &Kit) -> Result<bool, KitStoreError> {
        update_kit_row(&*self.pool, kit).await
    }

    #[instrument(skip(self), fields(kit_id = %id), err)]
    async fn delete_kit(&self, id: KitId) -> Result<bool, KitStoreError> {
        let result = sqlx::query("DELETE FROM kits WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_kit", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Transaction handle of [`PgKitStore`].
///
/// Dropping it without commit rolls the transaction back (SQLx behaviour).
pub struct PgKitTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl KitTransaction for PgKitTransaction {
    async fn insert_kit(&mut self, kit: &Kit) -> Result<(), KitStoreError> {
        sqlx::query(&format!(
            "INSERT INTO kits ({KIT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(kit.id.as_uuid())
        .bind(&kit.code)
        .bind(&kit.name)
        .bind(&kit.description)
        .bind(kit.status.as_str())
        .bind(kit.company_id.map(uuid::Uuid::from))
        .bind(to_opt_int("default_delivery_days", kit.default_delivery_days)?)
        .bind(kit.total_value)
        .bind(kit.selling_price)
        .bind(kit.created_at)
        .bind(kit.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_kit", e))?;
        Ok(())
    }

    async fn update_kit(&mut self, kit: &Kit) -> Result<bool, KitStoreError> {
        update_kit_row(&mut *self.tx, kit).await
    }

    async fn clear_children(
        &mut self,
        kit_id: KitId,
        kind: ReferenceKind,
    ) -> Result<u64, KitStoreError> {
        let sql = match kind {
            ReferenceKind::Exam => "DELETE FROM kit_exams WHERE kit_id = $1",
            ReferenceKind::Location => "DELETE FROM kit_locations WHERE kit_id = $1",
            ReferenceKind::Agreement => "DELETE FROM kit_agreements WHERE kit_id = $1",
        };
        let result = sqlx::query(sql)
            .bind(kit_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("clear_children", e))?;
        Ok(result.rows_affected())
    }

    async fn insert_exam(&mut self, row: &KitExam) -> Result<(), KitStoreError> {
        sqlx::query(
            r#"
            INSERT INTO kit_exams (kit_id, exam_id, quantity, insertion_order, notes)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.kit_id.as_uuid())
        .bind(row.exam_id.as_uuid())
        .bind(to_int("quantity", row.quantity)?)
        .bind(to_opt_int("insertion_order", row.insertion_order)?)
        .bind(&row.notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_exam", e))?;
        Ok(())
    }

    async fn insert_location(&mut self, row: &KitLocation) -> Result<(), KitStoreError> {
        sqlx::query("INSERT INTO kit_locations (kit_id, location_id) VALUES ($1, $2)")
            .bind(row.kit_id.as_uuid())
            .bind(row.location_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    async fn insert_agreement(&mut self, row: &KitAgreement) -> Result<(), KitStoreError> {
        sqlx::query("INSERT INTO kit_agreements (kit_id, agreement_id) VALUES ($1, $2)")
            .bind(row.kit_id.as_uuid())
            .bind(row.agreement_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_agreement", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), KitStoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), KitStoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Returns `false` when no row has the kit's id.
async fn update_kit_row<'e, E>(executor: E, kit: &Kit) -> Result<bool, KitStoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE kits SET
            code = $2,
            name = $3,
            description = $4,
            status = $5,
            company_id = $6,
            default_delivery_days = $7,
            total_value = $8,
            selling_price = $9,
            updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(kit.id.as_uuid())
    .bind(&kit.code)
    .bind(&kit.name)
    .bind(&kit.description)
    .bind(kit.status.as_str())
    .bind(kit.company_id.map(uuid::Uuid::from))
    .bind(to_opt_int("default_delivery_days", kit.default_delivery_days)?)
    .bind(kit.total_value)
    .bind(kit.selling_price)
    .bind(kit.updated_at)
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error("update_kit", e))?;
    Ok(result.rows_affected() > 0)
}

/// Map SQLx errors to KitStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> KitStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => KitStoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                    message: msg,
                },
                _ => KitStoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            KitStoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => KitStoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Narrow a domain counter to an `INTEGER` column.
fn to_int(column: &str, value: u32) -> Result<i32, KitStoreError> {
    i32::try_from(value).map_err(|_| {
        KitStoreError::backend(format!("{column} value {value} does not fit an INTEGER column"))
    })
}

fn to_opt_int(column: &str, value: Option<u32>) -> Result<Option<i32>, KitStoreError> {
    value.map(|v| to_int(column, v)).transpose()
}

fn column_decode<E>(column: &str, source: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn get_count(row: &PgRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| column_decode(column, e))
}

fn get_opt_count(row: &PgRow, column: &str) -> Result<Option<u32>, sqlx::Error> {
    let value: Option<i32> = row.try_get(column)?;
    value
        .map(|v| u32::try_from(v).map_err(|e| column_decode(column, e)))
        .transpose()
}

fn decode_kit(row: &PgRow) -> Result<Kit, KitStoreError> {
    KitRow::from_row(row)
        .map(Kit::from)
        .map_err(|e| KitStoreError::backend(format!("failed to decode kit row: {e}")))
}

fn decode_rows<'r, R, T>(rows: &'r [PgRow]) -> Result<Vec<T>, KitStoreError>
where
    R: FromRow<'r, PgRow> + Into<T>,
{
    rows.iter()
        .map(|row| {
            R::from_row(row)
                .map(Into::into)
                .map_err(|e| KitStoreError::backend(format!("failed to decode child row: {e}")))
        })
        .collect()
}

// SQLx row types

#[derive(Debug)]
struct KitRow {
    id: uuid::Uuid,
    code: String,
    name: String,
    description: Option<String>,
    status: KitStatus,
    company_id: Option<uuid::Uuid>,
    default_delivery_days: Option<u32>,
    total_value: Option<Decimal>,
    selling_price: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for KitRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<KitStatus>()
            .map_err(|e| column_decode("status", e))?;
        Ok(KitRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status,
            company_id: row.try_get("company_id")?,
            default_delivery_days: get_opt_count(row, "default_delivery_days")?,
            total_value: row.try_get("total_value")?,
            selling_price: row.try_get("selling_price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<KitRow> for Kit {
    fn from(row: KitRow) -> Self {
        Kit {
            id: KitId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            description: row.description,
            status: row.status,
            company_id: row.company_id.map(CompanyId::from_uuid),
            default_delivery_days: row.default_delivery_days,
            total_value: row.total_value,
            selling_price: row.selling_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct KitExamRow {
    kit_id: uuid::Uuid,
    exam_id: uuid::Uuid,
    quantity: u32,
    insertion_order: Option<u32>,
    notes: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for KitExamRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(KitExamRow {
            kit_id: row.try_get("kit_id")?,
            exam_id: row.try_get("exam_id")?,
            quantity: get_count(row, "quantity")?,
            insertion_order: get_opt_count(row, "insertion_order")?,
            notes: row.try_get("notes")?,
        })
    }
}

impl From<KitExamRow> for KitExam {
    fn from(row: KitExamRow) -> Self {
        KitExam {
            kit_id: KitId::from_uuid(row.kit_id),
            exam_id: ExamId::from_uuid(row.exam_id),
            quantity: row.quantity,
            insertion_order: row.insertion_order,
            notes: row.notes,
        }
    }
}

#[derive(Debug)]
struct KitLocationRow {
    kit_id: uuid::Uuid,
    location_id: uuid::Uuid,
}

impl<'r> FromRow<'r, PgRow> for KitLocationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(KitLocationRow {
            kit_id: row.try_get("kit_id")?,
            location_id: row.try_get("location_id")?,
        })
    }
}

impl From<KitLocationRow> for KitLocation {
    fn from(row: KitLocationRow) -> Self {
        KitLocation {
            kit_id: KitId::from_uuid(row.kit_id),
            location_id: LocationId::from_uuid(row.location_id),
        }
    }
}

#[derive(Debug)]
struct KitAgreementRow {
    kit_id: uuid::Uuid,
    agreement_id: uuid::Uuid,
}

impl<'r> FromRow<'r, PgRow> for KitAgreementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(KitAgreementRow {
            kit_id: row.try_get("kit_id")?,
            agreement_id: row.try_get("agreement_id")?,
        })
    }
}

impl From<KitAgreementRow> for KitAgreement {
    fn from(row: KitAgreementRow) -> Self {
        KitAgreement {
            kit_id: KitId::from_uuid(row.kit_id),
            agreement_id: AgreementId::from_uuid(row.agreement_id),
        }
    }
}
