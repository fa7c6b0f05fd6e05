//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
///
/// - **Value Object**: `Amount(1500)` equals any other `Amount(1500)`
/// - **Entity**: two projects with the same name are still different projects
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive money amount in the smallest currency unit (e.g. cents).
///
/// Payments can only be built from an `Amount`, so "amount > 0" is checked
/// once, at the boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(minor_units: i64) -> DomainResult<Self> {
        if minor_units <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        Ok(Self(minor_units))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl ValueObject for Amount {}

impl TryFrom<i64> for Amount {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Normalized email address (trimmed, lowercase, shape-checked).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_lowercase();
        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(DomainError::validation("email must contain '@'"));
        };
        if local.is_empty() || domain.contains('@') {
            return Err(DomainError::validation("email is malformed"));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(DomainError::validation("email domain is malformed"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Email {}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert!(Amount::new(0).is_err());
        assert!(Amount::new(-5).is_err());
        assert_eq!(Amount::new(1).unwrap().get(), 1);
    }

    #[test]
    fn amount_deserialization_validates() {
        assert!(serde_json::from_str::<Amount>("0").is_err());
        assert_eq!(serde_json::from_str::<Amount>("2500").unwrap().get(), 2500);
    }

    #[test]
    fn email_is_normalized() {
        let email = Email::parse("  Alice@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "alice", "@example.com", "a@b", "a@@b.com", "a@.com", "a@b."] {
            assert!(Email::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    proptest! {
        #[test]
        fn positive_amounts_always_construct(n in 1i64..i64::MAX) {
            prop_assert_eq!(Amount::new(n).unwrap().get(), n);
        }
    }
}
