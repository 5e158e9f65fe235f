//! Child collections owned by a kit.
//!
//! Each collection is a plain set of value rows keyed by `(kit_id, reference)`.
//! Rows never hold catalog objects, only the referenced id plus the attributes
//! that belong to the link itself.

use serde::{Deserialize, Serialize};

use labops_catalogs::ReferenceKind;
use labops_core::{AgreementId, ExamId, KitId, LocationId};

use crate::input::{KitAgreementInput, KitExamInput, KitLocationInput};

/// Exam linked to a kit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitExam {
    pub kit_id: KitId,
    pub exam_id: ExamId,
    pub quantity: u32,
    pub insertion_order: Option<u32>,
    pub notes: Option<String>,
}

impl KitExam {
    pub const DEFAULT_QUANTITY: u32 = 1;

    pub fn from_input(kit_id: KitId, input: &KitExamInput) -> Self {
        Self {
            kit_id,
            exam_id: input.exam_id,
            quantity: input.quantity.unwrap_or(Self::DEFAULT_QUANTITY),
            insertion_order: input.insertion_order,
            notes: input.notes.clone(),
        }
    }

    /// Back to the input shape, dropping the owning kit.
    pub fn to_input(&self) -> KitExamInput {
        KitExamInput {
            exam_id: self.exam_id,
            quantity: Some(self.quantity),
            insertion_order: self.insertion_order,
            notes: self.notes.clone(),
        }
    }
}

/// Service location where a kit is offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitLocation {
    pub kit_id: KitId,
    pub location_id: LocationId,
}

impl KitLocation {
    pub fn from_input(kit_id: KitId, input: &KitLocationInput) -> Self {
        Self {
            kit_id,
            location_id: input.location_id,
        }
    }

    pub fn to_input(&self) -> KitLocationInput {
        KitLocationInput {
            location_id: self.location_id,
        }
    }
}

/// Agreement a kit can be billed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitAgreement {
    pub kit_id: KitId,
    pub agreement_id: AgreementId,
}

impl KitAgreement {
    pub fn from_input(kit_id: KitId, input: &KitAgreementInput) -> Self {
        Self {
            kit_id,
            agreement_id: input.agreement_id,
        }
    }

    pub fn to_input(&self) -> KitAgreementInput {
        KitAgreementInput {
            agreement_id: self.agreement_id,
        }
    }
}

/// The three child collections of one kit, as loaded from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitChildren {
    pub exams: Vec<KitExam>,
    pub locations: Vec<KitLocation>,
    pub agreements: Vec<KitAgreement>,
}

impl KitChildren {
    /// Sort exams by `insertion_order`, unordered rows last.
    ///
    /// The sort is stable, so rows sharing an order (or lacking one) keep the
    /// order they were written in.
    pub fn order_exams(&mut self) {
        self.exams
            .sort_by_key(|e| (e.insertion_order.is_none(), e.insertion_order));
    }

    pub fn len_of(&self, kind: ReferenceKind) -> usize {
        match kind {
            ReferenceKind::Exam => self.exams.len(),
            ReferenceKind::Location => self.locations.len(),
            ReferenceKind::Agreement => self.agreements.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty() && self.locations.is_empty() && self.agreements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam(kit_id: KitId, order: Option<u32>) -> KitExam {
        KitExam {
            kit_id,
            exam_id: ExamId::new(),
            quantity: 1,
            insertion_order: order,
            notes: None,
        }
    }

    #[test]
    fn exam_quantity_defaults_to_one() {
        let kit_id = KitId::new();
        let input = KitExamInput::new(ExamId::new());
        let row = KitExam::from_input(kit_id, &input);
        assert_eq!(row.quantity, 1);
        assert_eq!(row.kit_id, kit_id);
    }

    #[test]
    fn exams_sort_by_insertion_order_with_unordered_last() {
        let kit_id = KitId::new();
        let unordered_a = exam(kit_id, None);
        let second = exam(kit_id, Some(2));
        let unordered_b = exam(kit_id, None);
        let first = exam(kit_id, Some(1));

        let mut children = KitChildren {
            exams: vec![
                unordered_a.clone(),
                second.clone(),
                unordered_b.clone(),
                first.clone(),
            ],
            ..KitChildren::default()
        };
        children.order_exams();

        assert_eq!(children.exams, vec![first, second, unordered_a, unordered_b]);
    }

    #[test]
    fn len_of_reports_each_collection() {
        let kit_id = KitId::new();
        let children = KitChildren {
            exams: vec![exam(kit_id, None), exam(kit_id, None)],
            locations: vec![KitLocation {
                kit_id,
                location_id: LocationId::new(),
            }],
            agreements: vec![],
        };
        assert_eq!(children.len_of(ReferenceKind::Exam), 2);
        assert_eq!(children.len_of(ReferenceKind::Location), 1);
        assert_eq!(children.len_of(ReferenceKind::Agreement), 0);
        assert!(!children.is_empty());
    }
}
