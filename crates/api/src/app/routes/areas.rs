//! Owner area (`/dashboard…`) and team area (`/team…`).
//!
//! By the time a handler here runs, the gate has already sent every caller
//! of the wrong kind elsewhere. The response is a JSON page descriptor.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::Uri,
    response::IntoResponse,
    routing::get,
};

use agencyledger_auth::classify;

use crate::app::dto::AccountView;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(page))
        .route("/dashboard/*rest", get(page))
        .route("/team", get(page))
        .route("/team/*rest", get(page))
}

pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    uri: Uri,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    Json(serde_json::json!({
        "area": classify(uri.path()),
        "account": ctx.account().map(AccountView::from),
        "organization_id": actor.organization_id(),
        "role": actor.role().map(|r| r.as_str()),
    }))
    .into_response()
}
