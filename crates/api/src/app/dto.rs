use core::str::FromStr;

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use agencyledger_auth::{Account, AccountKind, Action, MembershipRole, ResourceKind};
use agencyledger_core::{AccountId, ClientId, DomainError, OrganizationId};
use agencyledger_ledger::{ExpenseType, PaymentType};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Identity assertion from the sign-in provider: a signed session-claims token.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub assertion: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: i64,
    pub payment_type: PaymentType,
    pub paid_on: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub client_id: ClientId,
    pub name: String,
    pub budget: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub account_id: AccountId,
    pub role: String,
    pub allocated_budget: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub assignee: Option<AccountId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub description: String,
    pub expense_type: ExpenseType,
    pub total_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: MembershipRole,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub kind: ResourceKind,
    pub organization_id: OrganizationId,
    /// Account the resource is assigned to, if any.
    pub subject: Option<AccountId>,
    pub action: Action,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub account_kind: AccountKind,
    pub display_name: String,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            email: a.email.as_str().to_string(),
            account_kind: a.kind,
            display_name: a.display_name.clone(),
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path id, answering `400 invalid_id` on garbage.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

#[cfg(test)]
mod tests {
    use agencyledger_core::ProjectId;

    use super::*;

    #[test]
    fn parse_id_rejects_garbage_with_400() {
        let id = ProjectId::new();
        assert_eq!(parse_id::<ProjectId>(&id.to_string()).unwrap(), id);
        assert_eq!(
            parse_id::<ProjectId>("nope").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn payment_request_uses_snake_case_types() {
        let req: RecordPaymentRequest = serde_json::from_value(serde_json::json!({
            "amount": 2500,
            "payment_type": "milestone",
            "paid_on": "2024-06-01",
        }))
        .unwrap();
        assert_eq!(req.payment_type, PaymentType::Milestone);
        assert_eq!(req.notes, None);
    }
}
