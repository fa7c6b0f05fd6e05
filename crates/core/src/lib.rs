//! `agencyledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{Entity, TenantOwned};
pub use error::{DomainError, DomainResult};
pub use id::{
    AccountId, AssignmentId, ClientId, ExpenseId, OrganizationId, PaymentId, ProjectId, TaskId,
};
pub use value_object::{Amount, Email, ValueObject};
