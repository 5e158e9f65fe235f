//! `labops-core`: identifiers and error primitives shared by every back-office module.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AgreementId, CompanyId, ExamId, KitId, LocationId};
