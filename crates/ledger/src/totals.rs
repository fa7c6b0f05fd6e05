//! Derived-total math shared by every ledger level.

use serde::{Deserialize, Serialize};

use agencyledger_core::{DomainError, DomainResult};

/// Full re-sum of live amounts.
///
/// Never a delta: callers pass every live record, so running it twice gives
/// the same answer. Sums in `i128` and reports a negative or out-of-range
/// result as a consistency violation instead of writing it.
pub fn recompute_total(amounts: impl IntoIterator<Item = i64>) -> DomainResult<i64> {
    let mut total: i128 = 0;
    for amount in amounts {
        total += amount as i128;
    }

    if total < 0 {
        return Err(DomainError::consistency(format!(
            "recomputed total is negative ({total})"
        )));
    }
    i64::try_from(total)
        .map_err(|_| DomainError::consistency(format!("recomputed total overflows ({total})")))
}

/// Three-way payment status against an expected total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

impl PaymentStatus {
    /// `pending` if nothing is paid, `completed` once paid reaches the total,
    /// otherwise `partial`. `total = None` means there is no ceiling, so any
    /// non-zero payment is `partial`.
    pub fn derive(paid: i64, total: Option<i64>) -> Self {
        if paid <= 0 {
            return PaymentStatus::Pending;
        }
        match total {
            Some(total) if paid >= total => PaymentStatus::Completed,
            _ => PaymentStatus::Partial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Completed => "completed",
        }
    }
}

/// `max(expected - paid, 0)`; absent expectation means nothing is pending.
pub fn pending(expected: Option<i64>, paid: i64) -> i64 {
    expected
        .map(|e| e.saturating_sub(paid).max(0))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_sums_all_amounts() {
        assert_eq!(recompute_total([]).unwrap(), 0);
        assert_eq!(recompute_total([15_000, 35_000]).unwrap(), 50_000);
    }

    #[test]
    fn negative_total_is_a_consistency_violation() {
        assert!(matches!(
            recompute_total([10, -20]),
            Err(DomainError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn overflow_is_a_consistency_violation() {
        assert!(matches!(
            recompute_total([i64::MAX, 1]),
            Err(DomainError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn status_is_a_pure_function_of_paid_and_total() {
        assert_eq!(PaymentStatus::derive(0, Some(100)), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::derive(40, Some(100)), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::derive(100, Some(100)), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::derive(120, Some(100)), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::derive(0, Some(0)), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::derive(5, None), PaymentStatus::Partial);
    }

    #[test]
    fn pending_never_goes_negative() {
        assert_eq!(pending(Some(100), 40), 60);
        assert_eq!(pending(Some(100), 140), 0);
        assert_eq!(pending(None, 40), 0);
    }
}
