//! Handler-side access helpers.
//!
//! The session middleware has already admitted the request. Handlers turn
//! the request context into an [`Actor`] here; the per-resource decision is
//! made by the policy evaluator (inside the ledger engine or the
//! provisioning rules), never by the handler itself.

use axum::http::StatusCode;
use axum::response::Response;

use agencyledger_auth::{Actor, TenantMembership};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::RequestContext;

/// The authenticated caller, with or without a membership.
pub async fn actor(services: &AppServices, ctx: &RequestContext) -> Result<Actor, Response> {
    match ctx.actor(&*services.directory).await {
        Ok(Some(actor)) => Ok(actor),
        Ok(None) => Err(errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "sign in required",
        )),
        Err(e) => Err(errors::directory_error_to_response(e)),
    }
}

/// The caller's active membership. Callers without one get `403 no_membership`.
pub fn membership(actor: &Actor) -> Result<&TenantMembership, Response> {
    actor.membership.as_ref().ok_or_else(|| {
        errors::json_error(
            StatusCode::FORBIDDEN,
            "no_membership",
            "account has no active organization membership",
        )
    })
}
