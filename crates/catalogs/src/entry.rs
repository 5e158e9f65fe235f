use serde::{Deserialize, Serialize};

use labops_core::{AgreementId, Entity, ExamId, LocationId};

/// Which catalog a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Exam,
    Location,
    Agreement,
}

impl ReferenceKind {
    /// Stable name used in error messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::Exam => "exam",
            ReferenceKind::Location => "location",
            ReferenceKind::Agreement => "agreement",
        }
    }
}

impl core::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that can be looked up by id in one of the reference catalogs.
pub trait CatalogEntry: Entity + Clone + Send + Sync + 'static {
    const KIND: ReferenceKind;
}

/// Exam offered by the laboratory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub code: String,
    pub name: String,
}

impl Exam {
    pub fn new(id: ExamId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Health unit where exams are collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub id: LocationId,
    pub name: String,
}

impl ServiceLocation {
    pub fn new(id: LocationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Insurance or partner agreement under which kits can be billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub name: String,
}

impl Agreement {
    pub fn new(id: AgreementId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Entity for Exam {
    type Id = ExamId;

    fn id(&self) -> ExamId {
        self.id
    }
}

impl Entity for ServiceLocation {
    type Id = LocationId;

    fn id(&self) -> LocationId {
        self.id
    }
}

impl Entity for Agreement {
    type Id = AgreementId;

    fn id(&self) -> AgreementId {
        self.id
    }
}

impl CatalogEntry for Exam {
    const KIND: ReferenceKind = ReferenceKind::Exam;
}

impl CatalogEntry for ServiceLocation {
    const KIND: ReferenceKind = ReferenceKind::Location;
}

impl CatalogEntry for Agreement {
    const KIND: ReferenceKind = ReferenceKind::Agreement;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_bound_to_entries() {
        assert_eq!(Exam::KIND, ReferenceKind::Exam);
        assert_eq!(ServiceLocation::KIND, ReferenceKind::Location);
        assert_eq!(Agreement::KIND.to_string(), "agreement");
    }

    #[test]
    fn entity_id_matches_field() {
        let id = ExamId::new();
        let exam = Exam::new(id, "HEM", "Hemograma");
        assert_eq!(Entity::id(&exam), id);
    }
}
