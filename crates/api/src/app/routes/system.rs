use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use agencyledger_infra::Directory;

use crate::app::dto::AccountView;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let account = ctx.account().map(AccountView::from);

    let organization = match actor.organization_id() {
        Some(id) => match services.directory.organization(id).await {
            Ok(org) => org,
            Err(e) => return errors::directory_error_to_response(e),
        },
        None => None,
    };

    Json(serde_json::json!({
        "account": account,
        "organization_id": actor.organization_id(),
        "organization": organization.map(|o| serde_json::json!({ "id": o.id, "name": o.name })),
        "role": actor.role().map(|r| r.as_str()),
    }))
    .into_response()
}
