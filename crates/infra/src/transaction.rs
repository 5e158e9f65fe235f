//! Unit of work around one storage transaction.
//!
//! ```text
//! Idle --begin--> Active --finish(Ok)--> Committed  --> Released
//!                        \-finish(Err)-> RolledBack --> Released
//! ```
//!
//! `finish` is the only way out of `Active`: it commits on success, rolls back
//! on failure and always releases the storage transaction. A unit of work
//! dropped while active (e.g. a cancelled future) logs a warning and the
//! backend discards the uncommitted writes.

use tracing::{debug, info, warn};

use crate::error::KitError;
use crate::kit_store::{KitStore, KitStoreError, KitTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Active,
    Committed,
    RolledBack,
    Released,
}

/// One transaction per public operation. Nesting is not supported.
pub struct UnitOfWork<T: KitTransaction> {
    operation: &'static str,
    tx: Option<T>,
    state: TxState,
}

impl<T: KitTransaction> UnitOfWork<T> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            tx: None,
            state: TxState::Idle,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Open the storage transaction (Idle → Active).
    pub async fn begin<S>(&mut self, store: &S) -> Result<(), KitError>
    where
        S: KitStore<Tx = T>,
    {
        if self.state != TxState::Idle {
            return Err(KitError::Storage(KitStoreError::backend(format!(
                "unit of work for {} already started",
                self.operation
            ))));
        }
        self.tx = Some(store.begin().await?);
        self.state = TxState::Active;
        debug!(operation = self.operation, "unit of work started");
        Ok(())
    }

    /// The open transaction. Fails outside `Active`.
    pub fn tx(&mut self) -> Result<&mut T, KitError> {
        match (self.state, self.tx.as_mut()) {
            (TxState::Active, Some(tx)) => Ok(tx),
            (state, _) => Err(KitError::Storage(KitStoreError::backend(format!(
                "unit of work for {} is not active ({state:?})",
                self.operation
            )))),
        }
    }

    /// Commit on `Ok`, roll back on `Err`, then release.
    ///
    /// The caller's error is returned unchanged; a failing rollback is only
    /// logged. A failing commit is returned as a storage error (a unique
    /// violation at commit becomes a conflict).
    pub async fn finish<R>(mut self, outcome: Result<R, KitError>) -> Result<R, KitError> {
        let Some(tx) = self.tx.take() else {
            return Err(outcome.err().unwrap_or_else(|| {
                KitError::Storage(KitStoreError::backend(format!(
                    "unit of work for {} finished without a transaction",
                    self.operation
                )))
            }));
        };

        let result = match outcome {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    self.state = TxState::Committed;
                    info!(operation = self.operation, "unit of work committed");
                    Ok(value)
                }
                Err(err) => {
                    self.state = TxState::RolledBack;
                    warn!(operation = self.operation, error = %err, "commit failed");
                    Err(KitError::from(err))
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        operation = self.operation,
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                self.state = TxState::RolledBack;
                warn!(operation = self.operation, error = %err, "unit of work rolled back");
                Err(err)
            }
        };

        self.state = TxState::Released;
        debug!(operation = self.operation, "unit of work released");
        result
    }
}

impl<T: KitTransaction> Drop for UnitOfWork<T> {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            warn!(
                operation = self.operation,
                "unit of work dropped while active; uncommitted writes discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit_store::InMemoryKitStore;
    use chrono::Utc;
    use labops_core::KitId;
    use labops_kits::{CreateKit, Kit};

    fn kit(code: &str) -> Kit {
        Kit::create(KitId::new(), &CreateKit::new(code, "Check-up"), Utc::now())
    }

    #[tokio::test]
    async fn ok_outcome_commits_and_releases() {
        let store = InMemoryKitStore::new();
        let k = kit("K1");

        let mut uow = UnitOfWork::new("test");
        assert_eq!(uow.state(), TxState::Idle);
        uow.begin(&store).await.unwrap();
        assert_eq!(uow.state(), TxState::Active);

        let outcome = uow.tx().unwrap().insert_kit(&k).await.map_err(KitError::from);
        let value = uow.finish(outcome.map(|_| 7)).await.unwrap();

        assert_eq!(value, 7);
        assert_eq!(store.find_kit(k.id).await.unwrap(), Some(k));
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn err_outcome_rolls_back_and_returns_original_error() {
        let store = InMemoryKitStore::new();
        let k = kit("K1");

        let mut uow = UnitOfWork::new("test");
        uow.begin(&store).await.unwrap();
        uow.tx().unwrap().insert_kit(&k).await.unwrap();

        let original = KitError::not_found("exam", "42");
        let err = uow.finish::<()>(Err(original.clone())).await.unwrap_err();

        assert_eq!(err, original);
        assert_eq!(store.find_kit(k.id).await.unwrap(), None);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn commit_time_unique_violation_is_conflict() {
        let store = InMemoryKitStore::new();

        let mut first = UnitOfWork::new("first");
        let mut second = UnitOfWork::new("second");
        first.begin(&store).await.unwrap();
        second.begin(&store).await.unwrap();
        first.tx().unwrap().insert_kit(&kit("K1")).await.unwrap();
        second.tx().unwrap().insert_kit(&kit("K1")).await.unwrap();

        first.finish(Ok(())).await.unwrap();
        let err = second.finish(Ok(())).await.unwrap_err();

        assert!(matches!(err, KitError::Conflict(_)));
        assert_eq!(store.table_sizes().kits, 1);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn begin_twice_is_rejected() {
        let store = InMemoryKitStore::new();
        let mut uow = UnitOfWork::new("test");
        uow.begin(&store).await.unwrap();
        assert!(matches!(uow.begin(&store).await, Err(KitError::Storage(_))));
        assert_eq!(store.open_transactions(), 1);
        drop(uow);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn tx_outside_active_is_an_error() {
        let mut uow = UnitOfWork::<crate::kit_store::InMemoryKitTransaction>::new("test");
        assert!(uow.tx().is_err());
    }
}
