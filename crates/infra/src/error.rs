//! Error taxonomy of the kit service.

use thiserror::Error;

use labops_core::DomainError;

use crate::catalog::CatalogError;
use crate::kit_store::KitStoreError;

/// Error returned by every `KitService` operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KitError {
    /// A unique business key is taken (fast-path check or storage constraint).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The kit, or a catalog record it references, does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The input broke a field rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Persistence or lookup failure with no business meaning.
    #[error(transparent)]
    Storage(KitStoreError),
}

impl KitError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP status a presentation layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            KitError::NotFound { .. } => 404,
            KitError::Conflict(_) => 409,
            KitError::Validation(_) => 400,
            KitError::Storage(_) => 500,
        }
    }
}

impl From<KitStoreError> for KitError {
    fn from(err: KitStoreError) -> Self {
        match err {
            KitStoreError::UniqueViolation { constraint, message } => {
                KitError::Conflict(format!("{message} ({constraint})"))
            }
            other => KitError::Storage(other),
        }
    }
}

impl From<CatalogError> for KitError {
    fn from(err: CatalogError) -> Self {
        KitError::Storage(KitStoreError::Backend(err.to_string()))
    }
}

impl From<DomainError> for KitError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                KitError::Validation(msg)
            }
            DomainError::NotFound { entity, id } => KitError::NotFound { entity, id },
            DomainError::Conflict(msg) => KitError::Conflict(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_becomes_conflict() {
        let err: KitError = KitStoreError::unique("kits_code_key", "code K1 exists").into();
        assert!(matches!(err, KitError::Conflict(ref msg) if msg.contains("kits_code_key")));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn backend_failure_stays_storage() {
        let err: KitError = KitStoreError::backend("connection reset").into();
        assert_eq!(err, KitError::Storage(KitStoreError::backend("connection reset")));
        assert_eq!(err.status_code(), 500);

        let err: KitError = CatalogError::Unavailable("timeout".into()).into();
        assert!(matches!(err, KitError::Storage(_)));
    }

    #[test]
    fn domain_errors_keep_their_meaning() {
        let err: KitError = DomainError::validation("name cannot be empty").into();
        assert_eq!(err, KitError::Validation("name cannot be empty".into()));
        assert_eq!(err.status_code(), 400);

        let err: KitError = DomainError::not_found("kit", "abc").into();
        assert_eq!(err, KitError::not_found("kit", "abc"));
        assert_eq!(err.status_code(), 404);
    }
}
