//! Payment mutations, recomputation and per-account ledger views.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;

use agencyledger_core::{AccountId, PaymentId};
use agencyledger_ledger::{NewPayment, PaymentScope, PaymentTarget};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/projects/:id/payments", post(record_project_payment))
        .route("/assignments/:id/payments", post(record_assignment_payment))
        .route("/expenses/:id/payments", post(record_expense_payment))
        .route("/payments/:id", delete(delete_payment))
        .route("/projects/:id/recompute", post(recompute_project))
        .route("/assignments/:id/recompute", post(recompute_assignment))
        .route("/expenses/:id/recompute", post(recompute_expense))
        .route("/accounts/:id/payments", get(account_payments))
        .route("/accounts/:id/earnings", get(account_earnings))
}

fn target(scope: PaymentScope, raw: &str) -> Result<PaymentTarget, axum::response::Response> {
    let id: uuid::Uuid = raw.parse().map_err(|e: uuid::Error| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{}: {e}", scope.as_str()))
    })?;
    Ok(PaymentTarget::from_parts(scope, id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Record
// ─────────────────────────────────────────────────────────────────────────────

pub async fn record_project_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    record(&services, &ctx, PaymentScope::Project, &id, body).await
}

pub async fn record_assignment_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    record(&services, &ctx, PaymentScope::TeamAssignment, &id, body).await
}

pub async fn record_expense_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    record(&services, &ctx, PaymentScope::Expense, &id, body).await
}

async fn record(
    services: &AppServices,
    ctx: &RequestContext,
    scope: PaymentScope,
    raw_id: &str,
    body: dto::RecordPaymentRequest,
) -> axum::response::Response {
    let target = match target(scope, raw_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(services, ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let payment = NewPayment {
        target,
        amount: body.amount,
        payment_type: body.payment_type,
        paid_on: body.paid_on,
        notes: body.notes,
    };
    match services.ledger.record_payment(&actor, payment, Utc::now()).await {
        Ok(update) => (StatusCode::CREATED, Json(update)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delete / recompute
// ─────────────────────────────────────────────────────────────────────────────

pub async fn delete_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let payment_id: PaymentId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services.ledger.delete_payment(&actor, payment_id).await {
        Ok(update) => (StatusCode::OK, Json(update.outcome)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn recompute_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    recompute(&services, &ctx, PaymentScope::Project, &id).await
}

pub async fn recompute_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    recompute(&services, &ctx, PaymentScope::TeamAssignment, &id).await
}

pub async fn recompute_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    recompute(&services, &ctx, PaymentScope::Expense, &id).await
}

async fn recompute(
    services: &AppServices,
    ctx: &RequestContext,
    scope: PaymentScope,
    raw_id: &str,
) -> axum::response::Response {
    let target = match target(scope, raw_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(services, ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services.ledger.recompute(&actor, target).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-account views
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/accounts/:id/payments - payment history of one team member
pub async fn account_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id: AccountId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services.ledger.account_payments(&actor, account_id).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /api/accounts/:id/earnings - allocated / received / pending
pub async fn account_earnings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id: AccountId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services.ledger.earnings(&actor, account_id).await {
        Ok(earnings) => (StatusCode::OK, Json(earnings)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
