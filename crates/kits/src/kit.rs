use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use labops_core::{CompanyId, DomainError, Entity, KitId};

use crate::children::{KitAgreement, KitChildren, KitExam, KitLocation};
use crate::input::{CreateKit, UpdateKit, NAME_MAX_LEN};

/// Marker appended to the name of a duplicated kit.
pub const COPY_SUFFIX: &str = " (Copy)";

/// Kit status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KitStatus {
    Active,
    Inactive,
    UnderReview,
}

impl KitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            KitStatus::Active => "ACTIVE",
            KitStatus::Inactive => "INACTIVE",
            KitStatus::UnderReview => "UNDER_REVIEW",
        }
    }

    /// Status after a toggle.
    ///
    /// `ACTIVE` becomes `INACTIVE`; any other status (including
    /// `UNDER_REVIEW`) becomes `ACTIVE`.
    pub fn toggled(self) -> Self {
        match self {
            KitStatus::Active => KitStatus::Inactive,
            KitStatus::Inactive | KitStatus::UnderReview => KitStatus::Active,
        }
    }
}

impl core::fmt::Display for KitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for KitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(KitStatus::Active),
            "INACTIVE" => Ok(KitStatus::Inactive),
            "UNDER_REVIEW" => Ok(KitStatus::UnderReview),
            other => Err(DomainError::validation(format!("unknown kit status '{other}'"))),
        }
    }
}

/// Aggregate root: Kit (the stored root row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kit {
    pub id: KitId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub status: KitStatus,
    pub company_id: Option<CompanyId>,
    pub default_delivery_days: Option<u32>,
    pub total_value: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Kit {
    /// Build the root row for a validated create input.
    pub fn create(id: KitId, input: &CreateKit, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: input.code.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            status: input.status.unwrap_or(KitStatus::Active),
            company_id: input.company_id,
            default_delivery_days: input.default_delivery_days,
            total_value: input.total_value,
            selling_price: input.selling_price,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the scalar part of an update: supplied values overwrite, the rest stays.
    pub fn apply_update(&mut self, update: &UpdateKit, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(company_id) = update.company_id {
            self.company_id = Some(company_id);
        }
        if let Some(days) = update.default_delivery_days {
            self.default_delivery_days = Some(days);
        }
        if let Some(total_value) = update.total_value {
            self.total_value = Some(total_value);
        }
        if let Some(price) = update.selling_price {
            self.selling_price = Some(price);
        }
        self.updated_at = now;
    }

    /// Flip the status in place and return the new one.
    pub fn toggle_status(&mut self, now: DateTime<Utc>) -> KitStatus {
        self.status = self.status.toggled();
        self.updated_at = now;
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == KitStatus::Active
    }
}

impl Entity for Kit {
    type Id = KitId;

    fn id(&self) -> KitId {
        self.id
    }
}

/// A kit together with its three child collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitAggregate {
    pub kit: Kit,
    pub exams: Vec<KitExam>,
    pub locations: Vec<KitLocation>,
    pub agreements: Vec<KitAgreement>,
}

impl KitAggregate {
    pub fn new(kit: Kit, mut children: KitChildren) -> Self {
        children.order_exams();
        Self {
            kit,
            exams: children.exams,
            locations: children.locations,
            agreements: children.agreements,
        }
    }

    pub fn id(&self) -> KitId {
        self.kit.id
    }

    /// Create input for a copy of this kit under `new_code`.
    ///
    /// Children are carried by catalog reference only, so the copy goes through
    /// the same validation as a fresh kit. The source name is cut short when
    /// needed so the suffixed name still fits [`NAME_MAX_LEN`].
    pub fn duplicate_input(&self, new_code: impl Into<String>) -> CreateKit {
        let base: String = self
            .kit
            .name
            .chars()
            .take(NAME_MAX_LEN - COPY_SUFFIX.chars().count())
            .collect();
        CreateKit {
            code: new_code.into(),
            name: format!("{base}{COPY_SUFFIX}"),
            description: self.kit.description.clone(),
            status: Some(KitStatus::UnderReview),
            company_id: self.kit.company_id,
            default_delivery_days: self.kit.default_delivery_days,
            total_value: self.kit.total_value,
            selling_price: self.kit.selling_price,
            exams: Some(self.exams.iter().map(KitExam::to_input).collect()),
            locations: Some(self.locations.iter().map(KitLocation::to_input).collect()),
            agreements: Some(self.agreements.iter().map(KitAgreement::to_input).collect()),
        }
    }
}
