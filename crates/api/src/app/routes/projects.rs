//! Ledger record setup (projects, assignments, tasks, expenses) and the
//! project summary view.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use agencyledger_core::ProjectId;
use agencyledger_infra::NewAssignment;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:id/assignments", post(assign))
        .route("/projects/:id/tasks", post(create_task))
        .route("/projects/:id/summary", get(project_summary))
        .route("/expenses", post(create_expense))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateProjectRequest>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .create_project(&actor, body.client_id, &body.name, body.budget, Utc::now())
        .await
    {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn assign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignRequest>,
) -> axum::response::Response {
    let project_id: ProjectId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let req = NewAssignment {
        project_id,
        account_id: body.account_id,
        role: body.role,
        allocated_budget: body.allocated_budget,
    };
    match services.ledger.assign(&actor, req, Utc::now()).await {
        Ok(assignment) => (StatusCode::CREATED, Json(assignment)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateTaskRequest>,
) -> axum::response::Response {
    let project_id: ProjectId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .create_task(&actor, project_id, &body.title, body.assignee)
        .await
    {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /api/projects/:id/summary - team count, task count, pending amount
pub async fn project_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let project_id: ProjectId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services.ledger.project_summary(&actor, project_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateExpenseRequest>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .create_expense(&actor, &body.description, body.expense_type, body.total_amount, Utc::now())
        .await
    {
        Ok(expense) => (StatusCode::CREATED, Json(expense)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
