//! Kits domain module.
//!
//! A kit is a sellable bundle of exams, offered at a set of service locations
//! and billable under a set of agreements. This crate contains the business
//! rules (validation, scalar merge, status toggle, duplication) implemented as
//! deterministic domain logic (no IO, no storage).

pub mod children;
pub mod input;
pub mod kit;

pub use children::{KitAgreement, KitChildren, KitExam, KitLocation};
pub use input::{
    CreateKit, KitAgreementInput, KitExamInput, KitLocationInput, UpdateKit, CODE_MAX_LEN,
    COUNT_MAX, MONEY_LIMIT, MONEY_SCALE, NAME_MAX_LEN,
};
pub use kit::{Kit, KitAggregate, KitStatus, COPY_SUFFIX};
