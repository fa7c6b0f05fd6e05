//! Authorization audit endpoint.
//!
//! Answers "would this caller be allowed to do X on a resource like Y, and
//! why not?" without touching any resource.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use agencyledger_auth::{Resource, explain};

use crate::app::dto;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/explain", get(explain_decision))
}

/// GET /api/authz/explain?kind=..&organization_id=..&subject=..&action=..
pub async fn explain_decision(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<dto::ExplainQuery>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let resource = Resource::assigned(query.kind, query.organization_id, query.subject);
    let explanation = explain(&actor, &resource, query.action);
    (StatusCode::OK, Json(explanation)).into_response()
}
