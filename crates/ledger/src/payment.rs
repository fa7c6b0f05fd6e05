use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agencyledger_core::{
    AccountId, Amount, AssignmentId, DomainError, DomainResult, Entity, ExpenseId, OrganizationId,
    PaymentId, ProjectId, TenantOwned,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Advance,
    Milestone,
    Regular,
    Final,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Advance => "advance",
            PaymentType::Milestone => "milestone",
            PaymentType::Regular => "regular",
            PaymentType::Final => "final",
        }
    }
}

impl core::str::FromStr for PaymentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advance" => Ok(PaymentType::Advance),
            "milestone" => Ok(PaymentType::Milestone),
            "regular" => Ok(PaymentType::Regular),
            "final" => Ok(PaymentType::Final),
            other => Err(DomainError::validation(format!("unknown payment type '{other}'"))),
        }
    }
}

/// Which ledger level a payment is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentScope {
    Project,
    TeamAssignment,
    Expense,
}

impl PaymentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentScope::Project => "project",
            PaymentScope::TeamAssignment => "team_assignment",
            PaymentScope::Expense => "expense",
        }
    }
}

impl core::str::FromStr for PaymentScope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" | "projects" => Ok(PaymentScope::Project),
            "team_assignment" | "assignment" | "assignments" => Ok(PaymentScope::TeamAssignment),
            "expense" | "expenses" => Ok(PaymentScope::Expense),
            other => Err(DomainError::validation(format!("unknown payment scope '{other}'"))),
        }
    }
}

/// The record a payment is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "target_id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Project(ProjectId),
    #[serde(rename = "team_assignment")]
    Assignment(AssignmentId),
    Expense(ExpenseId),
}

impl PaymentTarget {
    pub fn from_parts(scope: PaymentScope, id: Uuid) -> Self {
        match scope {
            PaymentScope::Project => PaymentTarget::Project(ProjectId::from_uuid(id)),
            PaymentScope::TeamAssignment => PaymentTarget::Assignment(AssignmentId::from_uuid(id)),
            PaymentScope::Expense => PaymentTarget::Expense(ExpenseId::from_uuid(id)),
        }
    }

    pub fn scope(&self) -> PaymentScope {
        match self {
            PaymentTarget::Project(_) => PaymentScope::Project,
            PaymentTarget::Assignment(_) => PaymentScope::TeamAssignment,
            PaymentTarget::Expense(_) => PaymentScope::Expense,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            PaymentTarget::Project(id) => *id.as_uuid(),
            PaymentTarget::Assignment(id) => *id.as_uuid(),
            PaymentTarget::Expense(id) => *id.as_uuid(),
        }
    }
}

impl core::fmt::Display for PaymentTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.scope().as_str(), self.id())
    }
}

/// An immutable payment record. Payments are inserted or deleted, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub organization_id: OrganizationId,
    #[serde(flatten)]
    pub target: PaymentTarget,
    pub amount: Amount,
    pub paid_on: NaiveDate,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub created_by: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantOwned for Payment {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

/// Input to `record_payment`, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub target: PaymentTarget,
    /// Minor units; must be > 0.
    pub amount: i64,
    pub payment_type: PaymentType,
    pub paid_on: NaiveDate,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validated_amount(&self) -> DomainResult<Amount> {
        Amount::new(self.amount)
    }

    /// Build the stored record. Ceiling and phase checks are the caller's job.
    pub fn into_payment(
        self,
        organization_id: OrganizationId,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> DomainResult<Payment> {
        let amount = self.validated_amount()?;
        let notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Payment {
            id: PaymentId::new(),
            organization_id,
            target: self.target,
            amount,
            paid_on: self.paid_on,
            payment_type: self.payment_type,
            notes,
            created_by,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_payment(amount: i64) -> NewPayment {
        NewPayment {
            target: PaymentTarget::Project(ProjectId::new()),
            amount,
            payment_type: PaymentType::Regular,
            paid_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        for amount in [0, -1, i64::MIN] {
            let err = new_payment(amount)
                .into_payment(OrganizationId::new(), AccountId::new(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn blank_notes_are_dropped() {
        let p = new_payment(100)
            .into_payment(OrganizationId::new(), AccountId::new(), Utc::now())
            .unwrap();
        assert_eq!(p.notes, None);
        assert_eq!(p.amount.get(), 100);
    }

    #[test]
    fn target_serializes_with_scope_tag() {
        let id = AssignmentId::new();
        let json = serde_json::to_value(PaymentTarget::Assignment(id)).unwrap();
        assert_eq!(json["scope"], "team_assignment");
        assert_eq!(json["target_id"], id.to_string());
    }

    #[test]
    fn scope_accepts_route_plurals() {
        assert_eq!("assignments".parse::<PaymentScope>().unwrap(), PaymentScope::TeamAssignment);
        assert_eq!("expense".parse::<PaymentScope>().unwrap(), PaymentScope::Expense);
        assert!("clients".parse::<PaymentScope>().is_err());
    }
}
