use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use labops_catalogs::ReferenceKind;
use labops_core::{AgreementId, KitId, LocationId};
use labops_kits::{Kit, KitAgreement, KitChildren, KitExam, KitLocation, KitStatus};

/// Kit storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors. The only
/// storage failure with business meaning is a unique violation, which the
/// service layer turns into a conflict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KitStoreError {
    /// A unique constraint rejected the write (at write or commit time).
    #[error("unique constraint {constraint} violated: {message}")]
    UniqueViolation { constraint: String, message: String },

    /// Any other storage failure (connectivity, other constraints, decoding).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl KitStoreError {
    pub fn unique(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Which kits a listing returns. Listings are ordered by kit name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitFilter {
    All,
    Status(KitStatus),
    /// Kits offered at this location.
    Location(LocationId),
    /// Kits billable under this agreement.
    Agreement(AgreementId),
}

/// Persistence port for kits and their child collections.
///
/// Reads run outside any transaction and only ever observe committed state.
/// Multi-row writes go through [`KitStore::begin`]; the single-row writes
/// (`save_kit`, `delete_kit`) run on their own.
///
/// Implementations must:
/// - enforce uniqueness of `code` and of each `(kit_id, reference)` child key
/// - remove a kit's children when the kit is deleted (cascade)
/// - never expose uncommitted transaction writes to readers
#[async_trait]
pub trait KitStore: Send + Sync {
    type Tx: KitTransaction;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, KitStoreError>;

    async fn find_kit(&self, id: KitId) -> Result<Option<Kit>, KitStoreError>;

    async fn find_kit_by_code(&self, code: &str) -> Result<Option<Kit>, KitStoreError>;

    async fn list_kits(&self, filter: KitFilter) -> Result<Vec<Kit>, KitStoreError>;

    /// Load the three child collections of a kit (empty if the kit has none).
    async fn load_children(&self, id: KitId) -> Result<KitChildren, KitStoreError>;

    /// Overwrite the scalar columns of an existing kit. Returns whether a row was written.
    async fn save_kit(&self, kit: &Kit) -> Result<bool, KitStoreError>;

    /// Delete a kit and, by cascade, its children. Returns whether a row was removed.
    async fn delete_kit(&self, id: KitId) -> Result<bool, KitStoreError>;
}

/// An open storage transaction.
///
/// Consumed by `commit` or `rollback`; either call releases the underlying
/// resource. Dropping an open transaction discards its writes.
#[async_trait]
pub trait KitTransaction: Send {
    async fn insert_kit(&mut self, kit: &Kit) -> Result<(), KitStoreError>;

    /// Returns whether a row was written; `false` means the kit is gone.
    async fn update_kit(&mut self, kit: &Kit) -> Result<bool, KitStoreError>;

    /// Delete every row of one child collection of a kit. Returns the number of rows removed.
    async fn clear_children(&mut self, kit_id: KitId, kind: ReferenceKind)
        -> Result<u64, KitStoreError>;

    async fn insert_exam(&mut self, row: &KitExam) -> Result<(), KitStoreError>;

    async fn insert_location(&mut self, row: &KitLocation) -> Result<(), KitStoreError>;

    async fn insert_agreement(&mut self, row: &KitAgreement) -> Result<(), KitStoreError>;

    async fn commit(self) -> Result<(), KitStoreError>;

    async fn rollback(self) -> Result<(), KitStoreError>;
}

#[async_trait]
impl<S> KitStore for Arc<S>
where
    S: KitStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, KitStoreError> {
        (**self).begin().await
    }

    async fn find_kit(&self, id: KitId) -> Result<Option<Kit>, KitStoreError> {
        (**self).find_kit(id).await
    }

    async fn find_kit_by_code(&self, code: &str) -> Result<Option<Kit>, KitStoreError> {
        (**self).find_kit_by_code(code).await
    }

    async fn list_kits(&self, filter: KitFilter) -> Result<Vec<Kit>, KitStoreError> {
        (**self).list_kits(filter).await
    }

    async fn load_children(&self, id: KitId) -> Result<KitChildren, KitStoreError> {
        (**self).load_children(id).await
    }

    async fn save_kit(&self, kit: &Kit) -> Result<bool, KitStoreError> {
        (**self).save_kit(kit).await
    }

    async fn delete_kit(&self, id: KitId) -> Result<bool, KitStoreError> {
        (**self).delete_kit(id).await
    }
}
