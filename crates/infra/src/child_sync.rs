//! Child collection synchronization.
//!
//! Writes the exam, location and agreement rows of one kit inside an open
//! transaction. Collections are processed exams → locations → agreements and
//! each list in caller order; every reference is resolved against its catalog
//! right before its row is written. The first failure stops the sync and the
//! caller's unit of work rolls everything back.

use tracing::debug;

use labops_catalogs::ReferenceKind;
use labops_core::KitId;
use labops_kits::{
    CreateKit, KitAgreement, KitAgreementInput, KitExam, KitExamInput, KitLocation,
    KitLocationInput, UpdateKit,
};

use crate::catalog::ReferenceCatalogs;
use crate::error::KitError;
use crate::kit_store::KitTransaction;
use crate::referential::resolve;

/// How supplied collections relate to what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Fresh kit: rows are only inserted.
    Insert,
    /// Existing kit: each supplied collection is cleared first, then inserted.
    Replace,
}

/// The child lists of a create or update input. `None` means "not supplied".
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildInputs<'a> {
    pub exams: Option<&'a [KitExamInput]>,
    pub locations: Option<&'a [KitLocationInput]>,
    pub agreements: Option<&'a [KitAgreementInput]>,
}

impl<'a> From<&'a CreateKit> for ChildInputs<'a> {
    fn from(input: &'a CreateKit) -> Self {
        Self {
            exams: input.exams.as_deref(),
            locations: input.locations.as_deref(),
            agreements: input.agreements.as_deref(),
        }
    }
}

impl<'a> From<&'a UpdateKit> for ChildInputs<'a> {
    fn from(input: &'a UpdateKit) -> Self {
        Self {
            exams: input.exams.as_deref(),
            locations: input.locations.as_deref(),
            agreements: input.agreements.as_deref(),
        }
    }
}

/// Write every supplied collection of `kit_id`.
pub async fn sync_children<T: KitTransaction>(
    tx: &mut T,
    catalogs: &ReferenceCatalogs,
    kit_id: KitId,
    inputs: ChildInputs<'_>,
    mode: SyncMode,
) -> Result<(), KitError> {
    if let Some(exams) = inputs.exams {
        clear_if_replacing(tx, kit_id, ReferenceKind::Exam, mode).await?;
        write_exams(tx, catalogs, kit_id, exams).await?;
    }
    if let Some(locations) = inputs.locations {
        clear_if_replacing(tx, kit_id, ReferenceKind::Location, mode).await?;
        write_locations(tx, catalogs, kit_id, locations).await?;
    }
    if let Some(agreements) = inputs.agreements {
        clear_if_replacing(tx, kit_id, ReferenceKind::Agreement, mode).await?;
        write_agreements(tx, catalogs, kit_id, agreements).await?;
    }
    Ok(())
}

async fn clear_if_replacing<T: KitTransaction>(
    tx: &mut T,
    kit_id: KitId,
    kind: ReferenceKind,
    mode: SyncMode,
) -> Result<(), KitError> {
    if mode == SyncMode::Replace {
        let removed = tx.clear_children(kit_id, kind).await?;
        debug!(%kit_id, %kind, removed, "cleared child collection");
    }
    Ok(())
}

pub async fn write_exams<T: KitTransaction>(
    tx: &mut T,
    catalogs: &ReferenceCatalogs,
    kit_id: KitId,
    inputs: &[KitExamInput],
) -> Result<(), KitError> {
    for input in inputs {
        resolve(catalogs.exams.as_ref(), input.exam_id).await?;
        tx.insert_exam(&KitExam::from_input(kit_id, input)).await?;
    }
    Ok(())
}

pub async fn write_locations<T: KitTransaction>(
    tx: &mut T,
    catalogs: &ReferenceCatalogs,
    kit_id: KitId,
    inputs: &[KitLocationInput],
) -> Result<(), KitError> {
    for input in inputs {
        resolve(catalogs.locations.as_ref(), input.location_id).await?;
        tx.insert_location(&KitLocation::from_input(kit_id, input))
            .await?;
    }
    Ok(())
}

pub async fn write_agreements<T: KitTransaction>(
    tx: &mut T,
    catalogs: &ReferenceCatalogs,
    kit_id: KitId,
    inputs: &[KitAgreementInput],
) -> Result<(), KitError> {
    for input in inputs {
        resolve(catalogs.agreements.as_ref(), input.agreement_id).await?;
        tx.insert_agreement(&KitAgreement::from_input(kit_id, input))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use labops_catalogs::{Agreement, Exam, ServiceLocation};
    use labops_core::{AgreementId, ExamId, LocationId};
    use labops_kits::Kit;

    use crate::catalog::InMemoryCatalog;
    use crate::kit_store::{InMemoryKitStore, KitStore};

    struct Fixture {
        store: InMemoryKitStore,
        catalogs: ReferenceCatalogs,
        exam_a: ExamId,
        exam_b: ExamId,
        location: LocationId,
        agreement: AgreementId,
        kit: Kit,
    }

    async fn fixture() -> Fixture {
        let exam_a = ExamId::new();
        let exam_b = ExamId::new();
        let location = LocationId::new();
        let agreement = AgreementId::new();
        let catalogs = ReferenceCatalogs::new(
            Arc::new(InMemoryCatalog::with_entries([
                Exam::new(exam_a, "HMG", "Hemogram"),
                Exam::new(exam_b, "GLI", "Glucose"),
            ])),
            Arc::new(InMemoryCatalog::with_entries([ServiceLocation::new(
                location, "Main unit",
            )])),
            Arc::new(InMemoryCatalog::with_entries([Agreement::new(
                agreement, "Private",
            )])),
        );
        let store = InMemoryKitStore::new();
        let kit = Kit::create(KitId::new(), &CreateKit::new("K1", "Check-up"), Utc::now());
        let mut tx = store.begin().await.unwrap();
        tx.insert_kit(&kit).await.unwrap();
        tx.commit().await.unwrap();
        Fixture {
            store,
            catalogs,
            exam_a,
            exam_b,
            location,
            agreement,
            kit,
        }
    }

    #[tokio::test]
    async fn insert_mode_writes_every_supplied_collection() {
        let f = fixture().await;
        let exams = [KitExamInput::new(f.exam_a), KitExamInput::new(f.exam_b)];
        let locations = [KitLocationInput::new(f.location)];
        let agreements = [KitAgreementInput::new(f.agreement)];

        let mut tx = f.store.begin().await.unwrap();
        sync_children(
            &mut tx,
            &f.catalogs,
            f.kit.id,
            ChildInputs {
                exams: Some(&exams),
                locations: Some(&locations),
                agreements: Some(&agreements),
            },
            SyncMode::Insert,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let children = f.store.load_children(f.kit.id).await.unwrap();
        assert_eq!(children.exams.len(), 2);
        assert_eq!(children.locations.len(), 1);
        assert_eq!(children.agreements.len(), 1);
    }

    #[tokio::test]
    async fn replace_mode_leaves_absent_collections_alone() {
        let f = fixture().await;
        let exams = [KitExamInput::new(f.exam_a)];
        let locations = [KitLocationInput::new(f.location)];

        let mut tx = f.store.begin().await.unwrap();
        sync_children(
            &mut tx,
            &f.catalogs,
            f.kit.id,
            ChildInputs {
                exams: Some(&exams),
                locations: Some(&locations),
                agreements: None,
            },
            SyncMode::Insert,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let replacement = [KitExamInput::new(f.exam_b)];
        let mut tx = f.store.begin().await.unwrap();
        sync_children(
            &mut tx,
            &f.catalogs,
            f.kit.id,
            ChildInputs {
                exams: Some(&replacement),
                locations: None,
                agreements: None,
            },
            SyncMode::Replace,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let children = f.store.load_children(f.kit.id).await.unwrap();
        let exam_ids: Vec<ExamId> = children.exams.iter().map(|e| e.exam_id).collect();
        assert_eq!(exam_ids, vec![f.exam_b]);
        assert_eq!(children.locations.len(), 1);
    }

    #[tokio::test]
    async fn unknown_reference_stops_before_later_collections() {
        let f = fixture().await;
        let missing = ExamId::new();
        let exams = [KitExamInput::new(f.exam_a), KitExamInput::new(missing)];
        let locations = [KitLocationInput::new(f.location)];

        let mut tx = f.store.begin().await.unwrap();
        let err = sync_children(
            &mut tx,
            &f.catalogs,
            f.kit.id,
            ChildInputs {
                exams: Some(&exams),
                locations: Some(&locations),
                agreements: None,
            },
            SyncMode::Insert,
        )
        .await
        .unwrap_err();

        assert_eq!(err, KitError::not_found("exam", missing));
        tx.rollback().await.unwrap();
        assert!(f.store.load_children(f.kit.id).await.unwrap().is_empty());
    }
}
