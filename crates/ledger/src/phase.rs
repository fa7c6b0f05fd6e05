//! Payment-type phase of a target.
//!
//! Reported alongside totals, derived from live payments and never stored.
//! It never gates a payment: only the amount and the allocation ceiling do.
//!
//! ```text
//! open ──advance──▶ advanced ──milestone/regular──▶ in_progress ──final──▶ settled
//!   └───────────────milestone/regular───────────────────┘                    ▲
//!   └─────────────────────────────final──────────────────────────────────────┘
//! ```
//!
//! Because the phase is the maximum over live payment types, deleting a
//! payment re-derives it from scratch and the result is independent of
//! insertion order.

use serde::{Deserialize, Serialize};

use crate::payment::PaymentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPhase {
    #[default]
    Open,
    Advanced,
    InProgress,
    Settled,
}

impl PaymentPhase {
    fn reached_by(payment_type: PaymentType) -> Self {
        match payment_type {
            PaymentType::Advance => PaymentPhase::Advanced,
            PaymentType::Milestone | PaymentType::Regular => PaymentPhase::InProgress,
            PaymentType::Final => PaymentPhase::Settled,
        }
    }

    pub fn derive(types: impl IntoIterator<Item = PaymentType>) -> Self {
        types
            .into_iter()
            .map(Self::reached_by)
            .max()
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPhase::Open => "open",
            PaymentPhase::Advanced => "advanced",
            PaymentPhase::InProgress => "in_progress",
            PaymentPhase::Settled => "settled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentType::*;

    #[test]
    fn empty_target_is_open() {
        assert_eq!(PaymentPhase::derive([]), PaymentPhase::Open);
    }

    #[test]
    fn phase_follows_the_furthest_live_payment() {
        assert_eq!(PaymentPhase::derive([Advance, Advance]), PaymentPhase::Advanced);
        assert_eq!(PaymentPhase::derive([Advance, Milestone]), PaymentPhase::InProgress);
        assert_eq!(PaymentPhase::derive([Final, Advance]), PaymentPhase::Settled);
    }

    #[test]
    fn deleting_the_final_re_derives_the_phase() {
        let live = [Advance, Regular];
        assert_eq!(PaymentPhase::derive(live), PaymentPhase::InProgress);
        assert_eq!(PaymentPhase::derive([Advance]), PaymentPhase::Advanced);
    }
}
