//! Caller-supplied inputs for creating and updating kits.
//!
//! Child lists are `Option<Vec<_>>` on purpose: on update, `None` (key absent)
//! leaves the stored collection untouched while `Some(vec![])` clears it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use labops_core::{AgreementId, CompanyId, DomainError, DomainResult, ExamId, LocationId};

use crate::kit::KitStatus;

/// Maximum length (in characters) of a kit code.
pub const CODE_MAX_LEN: usize = 50;

/// Maximum length (in characters) of a kit name.
pub const NAME_MAX_LEN: usize = 255;

/// Upper bound of quantities, insertion orders and delivery days (`INTEGER` columns).
pub const COUNT_MAX: u32 = i32::MAX as u32;

/// Decimal places kept for money values.
pub const MONEY_SCALE: u32 = 2;

/// Money values must stay below 10^8 (`NUMERIC(10, 2)`).
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Exam reference inside a create/update input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitExamInput {
    pub exam_id: ExamId,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub insertion_order: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl KitExamInput {
    pub fn new(exam_id: ExamId) -> Self {
        Self {
            exam_id,
            quantity: None,
            insertion_order: None,
            notes: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_insertion_order(mut self, order: u32) -> Self {
        self.insertion_order = Some(order);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn validate(&self) -> DomainResult<()> {
        if self.quantity == Some(0) {
            return Err(DomainError::validation(format!(
                "quantity for exam {} must be at least 1",
                self.exam_id
            )));
        }
        if self.insertion_order == Some(0) {
            return Err(DomainError::validation(format!(
                "insertion_order for exam {} must be at least 1",
                self.exam_id
            )));
        }
        if self.quantity.is_some_and(|q| q > COUNT_MAX) {
            return Err(DomainError::validation(format!(
                "quantity for exam {} cannot exceed {COUNT_MAX}",
                self.exam_id
            )));
        }
        if self.insertion_order.is_some_and(|o| o > COUNT_MAX) {
            return Err(DomainError::validation(format!(
                "insertion_order for exam {} cannot exceed {COUNT_MAX}",
                self.exam_id
            )));
        }
        Ok(())
    }
}

/// Service location reference inside a create/update input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitLocationInput {
    pub location_id: LocationId,
}

impl KitLocationInput {
    pub fn new(location_id: LocationId) -> Self {
        Self { location_id }
    }
}

/// Agreement reference inside a create/update input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitAgreementInput {
    pub agreement_id: AgreementId,
}

impl KitAgreementInput {
    pub fn new(agreement_id: AgreementId) -> Self {
        Self { agreement_id }
    }
}

/// Input: create a kit together with its initial children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKit {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<KitStatus>,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub default_delivery_days: Option<u32>,
    #[serde(default)]
    pub total_value: Option<Decimal>,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub exams: Option<Vec<KitExamInput>>,
    #[serde(default)]
    pub locations: Option<Vec<KitLocationInput>>,
    #[serde(default)]
    pub agreements: Option<Vec<KitAgreementInput>>,
}

impl CreateKit {
    /// Minimal input: code and name, everything else left to defaults.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: None,
            status: None,
            company_id: None,
            default_delivery_days: None,
            total_value: None,
            selling_price: None,
            exams: None,
            locations: None,
            agreements: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_code(&self.code)?;
        validate_name(&self.name)?;
        validate_scalars(
            self.default_delivery_days,
            self.total_value,
            self.selling_price,
        )?;
        validate_exams(self.exams.as_deref())
    }
}

/// Input: partial update of a kit.
///
/// Every scalar is optional; only `Some` values overwrite the stored kit.
/// The code is immutable and therefore absent here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateKit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<KitStatus>,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub default_delivery_days: Option<u32>,
    #[serde(default)]
    pub total_value: Option<Decimal>,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub exams: Option<Vec<KitExamInput>>,
    #[serde(default)]
    pub locations: Option<Vec<KitLocationInput>>,
    #[serde(default)]
    pub agreements: Option<Vec<KitAgreementInput>>,
}

impl UpdateKit {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_scalars(
            self.default_delivery_days,
            self.total_value,
            self.selling_price,
        )?;
        validate_exams(self.exams.as_deref())
    }

    /// Whether the update carries any child collection at all.
    pub fn touches_children(&self) -> bool {
        self.exams.is_some() || self.locations.is_some() || self.agreements.is_some()
    }
}

fn validate_code(code: &str) -> DomainResult<()> {
    if code.trim().is_empty() {
        return Err(DomainError::validation("code cannot be empty"));
    }
    if code.chars().count() > CODE_MAX_LEN {
        return Err(DomainError::validation(format!(
            "code cannot exceed {CODE_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::validation(format!(
            "name cannot exceed {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_scalars(
    default_delivery_days: Option<u32>,
    total_value: Option<Decimal>,
    selling_price: Option<Decimal>,
) -> DomainResult<()> {
    if default_delivery_days == Some(0) {
        return Err(DomainError::validation(
            "default_delivery_days must be at least 1",
        ));
    }
    if default_delivery_days.is_some_and(|d| d > COUNT_MAX) {
        return Err(DomainError::validation(format!(
            "default_delivery_days cannot exceed {COUNT_MAX}"
        )));
    }
    validate_money("total_value", total_value)?;
    validate_money("selling_price", selling_price)
}

fn validate_money(field: &str, value: Option<Decimal>) -> DomainResult<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    if value >= MONEY_LIMIT {
        return Err(DomainError::validation(format!(
            "{field} must be less than {MONEY_LIMIT}"
        )));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::validation(format!(
            "{field} cannot have more than {MONEY_SCALE} decimal places"
        )));
    }
    Ok(())
}

fn validate_exams(exams: Option<&[KitExamInput]>) -> DomainResult<()> {
    exams
        .unwrap_or_default()
        .iter()
        .try_for_each(KitExamInput::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn create_accepts_minimal_input() {
        assert!(CreateKit::new("KIT001", "Check-up").validate().is_ok());
    }

    #[test]
    fn create_rejects_blank_code_and_name() {
        let err = CreateKit::new("   ", "Check-up").validate().unwrap_err();
        assert_eq!(err, DomainError::validation("code cannot be empty"));

        let err = CreateKit::new("KIT001", "").validate().unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));
    }

    #[test]
    fn create_rejects_overlong_code() {
        let code = "K".repeat(CODE_MAX_LEN + 1);
        let err = CreateKit::new(code, "Check-up").validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let code = "K".repeat(CODE_MAX_LEN);
        assert!(CreateKit::new(code, "Check-up").validate().is_ok());
    }

    #[test]
    fn create_rejects_zero_delivery_days_and_negative_prices() {
        let mut input = CreateKit::new("KIT001", "Check-up");
        input.default_delivery_days = Some(0);
        assert!(input.validate().is_err());

        let mut input = CreateKit::new("KIT001", "Check-up");
        input.selling_price = Some(Decimal::new(-1, 2));
        assert!(input.validate().is_err());

        let mut input = CreateKit::new("KIT001", "Check-up");
        input.total_value = Some(Decimal::new(-5000, 2));
        assert!(input.validate().is_err());

        let mut input = CreateKit::new("KIT001", "Check-up");
        input.selling_price = Some(Decimal::ZERO);
        input.default_delivery_days = Some(1);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn create_rejects_zero_quantity_exam() {
        let mut input = CreateKit::new("KIT001", "Check-up");
        input.exams = Some(vec![
            KitExamInput::new(ExamId::new()),
            KitExamInput::new(ExamId::new()).with_quantity(0),
        ]);
        let err = input.validate().unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("quantity")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn counters_are_bounded_by_the_integer_column() {
        let exam = ExamId::new();
        let mut input = CreateKit::new("KIT001", "Check-up");
        input.exams = Some(vec![KitExamInput::new(exam).with_quantity(3_000_000_000)]);
        assert_eq!(
            input.validate().unwrap_err(),
            DomainError::validation(format!("quantity for exam {exam} cannot exceed {COUNT_MAX}"))
        );

        input.exams = Some(vec![KitExamInput::new(exam).with_insertion_order(COUNT_MAX + 1)]);
        assert!(input.validate().is_err());

        input.exams = Some(vec![KitExamInput::new(exam)
            .with_quantity(COUNT_MAX)
            .with_insertion_order(COUNT_MAX)]);
        assert!(input.validate().is_ok());

        let update = UpdateKit {
            default_delivery_days: Some(COUNT_MAX + 1),
            ..UpdateKit::default()
        };
        assert_eq!(
            update.validate().unwrap_err(),
            DomainError::validation(format!("default_delivery_days cannot exceed {COUNT_MAX}"))
        );
    }

    #[test]
    fn money_must_fit_ten_digits_with_two_decimals() {
        let mut input = CreateKit::new("KIT001", "Check-up");
        input.total_value = Some(Decimal::new(100_000_000, 0));
        assert_eq!(
            input.validate().unwrap_err(),
            DomainError::validation("total_value must be less than 100000000")
        );

        let mut input = CreateKit::new("KIT001", "Check-up");
        input.selling_price = Some(Decimal::new(1001, 3));
        assert_eq!(
            input.validate().unwrap_err(),
            DomainError::validation("selling_price cannot have more than 2 decimal places")
        );

        let mut input = CreateKit::new("KIT001", "Check-up");
        input.total_value = Some(Decimal::new(9_999_999_999, 2));
        input.selling_price = Some(Decimal::new(1500, 3));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn update_validates_only_supplied_fields() {
        assert!(UpdateKit::default().validate().is_ok());

        let update = UpdateKit {
            name: Some(" ".to_string()),
            ..UpdateKit::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn absent_child_key_differs_from_empty_list() {
        let absent: UpdateKit = serde_json::from_str(r#"{ "name": "Renamed" }"#).unwrap();
        assert_eq!(absent.exams, None);
        assert!(!absent.touches_children());

        let cleared: UpdateKit = serde_json::from_str(r#"{ "exams": [] }"#).unwrap();
        assert_eq!(cleared.exams, Some(vec![]));
        assert!(cleared.touches_children());
    }

    #[test]
    fn create_deserializes_child_references() {
        let exam_id = ExamId::new();
        let json = serde_json::json!({
            "code": "KIT001",
            "name": "Check-up",
            "status": "UNDER_REVIEW",
            "selling_price": "120.50",
            "exams": [{ "exam_id": exam_id, "quantity": 2 }],
        });
        let input: CreateKit = serde_json::from_value(json).unwrap();
        assert_eq!(input.status, Some(KitStatus::UnderReview));
        assert_eq!(input.selling_price, Some(Decimal::new(12050, 2)));
        let exams = input.exams.unwrap();
        assert_eq!(exams[0].exam_id, exam_id);
        assert_eq!(exams[0].quantity, Some(2));
        assert_eq!(input.locations, None);
    }
}
