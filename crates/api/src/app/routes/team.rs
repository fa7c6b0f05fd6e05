//! Team-member provisioning and membership management.
//!
//! Every write is authorized as `Create` / `Update` / `Delete` on the
//! membership resource before the provisioning invariants run.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;
use tracing::info;

use agencyledger_auth::{
    Action, Actor, Membership, NewTeamMember, Resource, ResourceKind, authorize, change_role,
    deactivate, provision_team_member,
};
use agencyledger_core::AccountId;
use agencyledger_infra::Directory;

use crate::app::dto::{self, AccountView};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_members).post(add_member))
        .route("/:id/role", patch(update_role))
        .route("/:id/deactivate", post(deactivate_member))
}

/// GET /api/team-members - memberships of the caller's organization
pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let organization_id = match authz::membership(&actor) {
        Ok(m) => m.organization_id,
        Err(resp) => return resp,
    };

    let resource = Resource::org_wide(ResourceKind::Membership, organization_id);
    if let Err(reason) = authorize(&actor, &resource, Action::Read).into_result() {
        return errors::deny_to_response(reason);
    }

    match services.directory.members(organization_id).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// POST /api/team-members - create a team-member account in the caller's organization
pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<NewTeamMember>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let organization_id = match authz::membership(&actor) {
        Ok(m) => m.organization_id,
        Err(resp) => return resp,
    };

    let (account, membership) = match provision_team_member(organization_id, &body, Utc::now()) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(resp) = authorize_membership(&actor, &membership, Action::Create) {
        return resp;
    }
    if let Err(e) = services.directory.save_team_member(&account, &membership).await {
        return errors::directory_error_to_response(e);
    }

    info!(
        actor_id = %actor.account_id,
        account_id = %account.id,
        organization_id = %membership.organization_id,
        role = %membership.role,
        "team member provisioned"
    );
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "account": AccountView::from(&account),
            "membership": membership,
        })),
    )
        .into_response()
}

fn authorize_membership(
    actor: &Actor,
    membership: &Membership,
    action: Action,
) -> Result<(), axum::response::Response> {
    let resource = Resource::membership(
        membership.organization_id,
        membership.account_id,
        membership.role.clone(),
    );
    authorize(actor, &resource, action)
        .into_result()
        .map_err(errors::deny_to_response)
}

/// Load a membership row of the caller's own organization.
async fn own_org_membership(
    services: &AppServices,
    actor: &Actor,
    raw_id: &str,
) -> Result<Membership, axum::response::Response> {
    let account_id: AccountId = dto::parse_id(raw_id)?;
    let organization_id = authz::membership(actor)?.organization_id;

    match services.directory.membership_row(organization_id, account_id).await {
        Ok(Some(m)) => Ok(m),
        Ok(None) => Err(errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "no such member in this organization",
        )),
        Err(e) => Err(errors::directory_error_to_response(e)),
    }
}

/// PATCH /api/team-members/:id/role
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeRoleRequest>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let target = match own_org_membership(&services, &actor, &id).await {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    if let Err(resp) = authorize_membership(&actor, &target, Action::Update) {
        return resp;
    }
    let updated = match change_role(target.organization_id, &target, body.role) {
        Ok(m) => m,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.directory.update_membership(&updated).await {
        return errors::directory_error_to_response(e);
    }

    info!(
        actor_id = %actor.account_id,
        account_id = %updated.account_id,
        from = %target.role,
        to = %updated.role,
        "membership role changed"
    );
    (StatusCode::OK, Json(updated)).into_response()
}

/// POST /api/team-members/:id/deactivate
pub async fn deactivate_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let actor = match authz::actor(&services, &ctx).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let target = match own_org_membership(&services, &actor, &id).await {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    if let Err(resp) = authorize_membership(&actor, &target, Action::Delete) {
        return resp;
    }
    let updated = match deactivate(target.organization_id, &target) {
        Ok(m) => m,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.directory.update_membership(&updated).await {
        return errors::directory_error_to_response(e);
    }

    info!(actor_id = %actor.account_id, account_id = %updated.account_id, "membership deactivated");
    (StatusCode::OK, Json(updated)).into_response()
}
