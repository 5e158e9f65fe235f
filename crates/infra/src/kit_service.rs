//! Kit aggregate service (application-level orchestration).
//!
//! This module composes the kit store, the reference catalogs and the unit of
//! work into the public kit operations.
//!
//! ## Write Flow
//!
//! ```text
//! Input
//!   ↓
//! 1. Validate (domain rules, no IO)
//!   ↓
//! 2. Fast-path uniqueness / existence checks (committed state)
//!   ↓
//! 3. UnitOfWork::begin
//!   ↓
//! 4. Root row, then exams → locations → agreements
//!    (each reference resolved right before its row is written)
//!   ↓
//! 5. UnitOfWork::finish (commit on Ok, rollback on Err, always release)
//!   ↓
//! 6. Reload the aggregate outside the transaction
//! ```
//!
//! ## Error Semantics
//!
//! - Input rule broken → `KitError::Validation`, nothing is opened
//! - Kit or catalog record missing → `KitError::NotFound { entity, id }`, also
//!   when the kit disappears between load and write
//! - Code already in use (fast path *or* storage constraint) → `KitError::Conflict`
//! - Anything else from storage or catalogs → `KitError::Storage`
//!
//! Single-row writes (`toggle_status`, `remove`) run without a unit of work.

use chrono::Utc;
use tracing::{info, instrument};

use labops_core::{AgreementId, KitId, LocationId};
use labops_kits::{CreateKit, Kit, KitAggregate, KitStatus, UpdateKit};

use crate::catalog::ReferenceCatalogs;
use crate::child_sync::{sync_children, ChildInputs, SyncMode};
use crate::error::KitError;
use crate::kit_store::{KitFilter, KitStore, KitTransaction};
use crate::transaction::UnitOfWork;

/// Kit operations over an injected store and catalogs.
///
/// ## Generic Parameters
///
/// - `S`: kit store implementation (in-memory for tests/dev, Postgres in production)
pub struct KitService<S: KitStore> {
    store: S,
    catalogs: ReferenceCatalogs,
}

impl<S: KitStore> KitService<S> {
    pub fn new(store: S, catalogs: ReferenceCatalogs) -> Self {
        Self { store, catalogs }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalogs(&self) -> &ReferenceCatalogs {
        &self.catalogs
    }

    /// Create a kit and its initial children in one transaction.
    #[instrument(skip(self, input), fields(code = %input.code), err)]
    pub async fn create(&self, input: CreateKit) -> Result<KitAggregate, KitError> {
        input.validate()?;
        self.ensure_code_free(&input.code).await?;

        let kit = Kit::create(KitId::new(), &input, Utc::now());

        let mut uow = UnitOfWork::new("create_kit");
        uow.begin(&self.store).await?;
        let outcome = self.write_new_kit(uow.tx()?, &kit, &input).await;
        uow.finish(outcome).await?;

        info!(kit_id = %kit.id, code = %kit.code, "kit created");
        self.find_one(kit.id).await
    }

    /// Merge scalars and fully replace every supplied child collection.
    #[instrument(skip(self, input), fields(kit_id = %id), err)]
    pub async fn update(&self, id: KitId, input: UpdateKit) -> Result<KitAggregate, KitError> {
        input.validate()?;
        let mut kit = self.load_kit(id).await?;
        kit.apply_update(&input, Utc::now());

        let mut uow = UnitOfWork::new("update_kit");
        uow.begin(&self.store).await?;
        let outcome = self.write_updated_kit(uow.tx()?, &kit, &input).await;
        uow.finish(outcome).await?;

        info!(kit_id = %id, children = input.touches_children(), "kit updated");
        self.find_one(id).await
    }

    /// Copy a kit under `new_code`, status `UNDER_REVIEW`, through the create path.
    #[instrument(skip(self), fields(kit_id = %id), err)]
    pub async fn duplicate(&self, id: KitId, new_code: &str) -> Result<KitAggregate, KitError> {
        let source = self.find_one(id).await?;
        self.ensure_code_free(new_code).await?;

        let copy = self.create(source.duplicate_input(new_code)).await?;
        info!(source_id = %id, kit_id = %copy.id(), "kit duplicated");
        Ok(copy)
    }

    /// Flip `ACTIVE` ↔ `INACTIVE` (`UNDER_REVIEW` becomes `ACTIVE`).
    #[instrument(skip(self), fields(kit_id = %id), err)]
    pub async fn toggle_status(&self, id: KitId) -> Result<KitAggregate, KitError> {
        let mut kit = self.load_kit(id).await?;
        let status = kit.toggle_status(Utc::now());
        if !self.store.save_kit(&kit).await? {
            return Err(KitError::not_found("kit", id));
        }

        info!(kit_id = %id, %status, "kit status toggled");
        self.assemble(kit).await
    }

    /// Delete a kit; its children go with it.
    #[instrument(skip(self), fields(kit_id = %id), err)]
    pub async fn remove(&self, id: KitId) -> Result<(), KitError> {
        self.load_kit(id).await?;
        if !self.store.delete_kit(id).await? {
            return Err(KitError::not_found("kit", id));
        }
        info!(kit_id = %id, "kit removed");
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn find_all(&self) -> Result<Vec<KitAggregate>, KitError> {
        self.list(KitFilter::All).await
    }

    #[instrument(skip(self), err)]
    pub async fn find_active(&self) -> Result<Vec<KitAggregate>, KitError> {
        self.list(KitFilter::Status(KitStatus::Active)).await
    }

    #[instrument(skip(self), fields(kit_id = %id), err)]
    pub async fn find_one(&self, id: KitId) -> Result<KitAggregate, KitError> {
        let kit = self.load_kit(id).await?;
        self.assemble(kit).await
    }

    #[instrument(skip(self), err)]
    pub async fn find_by_code(&self, code: &str) -> Result<KitAggregate, KitError> {
        let kit = self
            .store
            .find_kit_by_code(code)
            .await?
            .ok_or_else(|| KitError::not_found("kit", code))?;
        self.assemble(kit).await
    }

    #[instrument(skip(self), fields(location_id = %location_id), err)]
    pub async fn find_by_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<KitAggregate>, KitError> {
        self.list(KitFilter::Location(location_id)).await
    }

    #[instrument(skip(self), fields(agreement_id = %agreement_id), err)]
    pub async fn find_by_agreement(
        &self,
        agreement_id: AgreementId,
    ) -> Result<Vec<KitAggregate>, KitError> {
        self.list(KitFilter::Agreement(agreement_id)).await
    }

    async fn ensure_code_free(&self, code: &str) -> Result<(), KitError> {
        match self.store.find_kit_by_code(code).await? {
            Some(existing) => Err(KitError::Conflict(format!(
                "kit code {code} already in use by kit {}",
                existing.id
            ))),
            None => Ok(()),
        }
    }

    async fn load_kit(&self, id: KitId) -> Result<Kit, KitError> {
        self.store
            .find_kit(id)
            .await?
            .ok_or_else(|| KitError::not_found("kit", id))
    }

    async fn assemble(&self, kit: Kit) -> Result<KitAggregate, KitError> {
        let children = self.store.load_children(kit.id).await?;
        Ok(KitAggregate::new(kit, children))
    }

    async fn list(&self, filter: KitFilter) -> Result<Vec<KitAggregate>, KitError> {
        let kits = self.store.list_kits(filter).await?;
        let mut aggregates = Vec::with_capacity(kits.len());
        for kit in kits {
            aggregates.push(self.assemble(kit).await?);
        }
        Ok(aggregates)
    }

    async fn write_new_kit(
        &self,
        tx: &mut S::Tx,
        kit: &Kit,
        input: &CreateKit,
    ) -> Result<(), KitError> {
        tx.insert_kit(kit).await?;
        sync_children(
            tx,
            &self.catalogs,
            kit.id,
            ChildInputs::from(input),
            SyncMode::Insert,
        )
        .await
    }

    async fn write_updated_kit(
        &self,
        tx: &mut S::Tx,
        kit: &Kit,
        input: &UpdateKit,
    ) -> Result<(), KitError> {
        if !tx.update_kit(kit).await? {
            return Err(KitError::not_found("kit", kit.id));
        }
        sync_children(
            tx,
            &self.catalogs,
            kit.id,
            ChildInputs::from(input),
            SyncMode::Replace,
        )
        .await
    }
}
