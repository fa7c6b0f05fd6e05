//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failures raised by the auth and ledger crates.
///
/// Storage and transport failures have their own error types in `infra`/`api`.
/// "No membership" is absent here: callers branch on it, it never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input: bad amount or over-allocation.
    /// Nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A recomputed derived total came out negative or overflowed.
    ///
    /// The mutation that produced it is aborted and the stored aggregate left
    /// untouched.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Unknown project, assignment, expense, payment or account.
    #[error("not found")]
    NotFound,

    /// Duplicate email, second membership for one account.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Valid identity, wrong role or organization.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::ConsistencyViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable machine-readable code, used as the `error` field of API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::ConsistencyViolation(_) => "consistency_violation",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized => "forbidden",
        }
    }

    /// A consistency violation means stored data and payments disagree; every
    /// other variant is a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConsistencyViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_consistency_violations_are_fatal() {
        assert!(DomainError::consistency("total_paid = -5").is_fatal());
        assert!(!DomainError::validation("amount must be positive").is_fatal());
        assert!(!DomainError::NotFound.is_fatal());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::consistency("x").code(), "consistency_violation");
        assert_eq!(DomainError::Unauthorized.code(), "forbidden");
        assert_eq!(DomainError::invalid_id("nope").code(), "invalid_id");
    }
}
