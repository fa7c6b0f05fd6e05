//! Session resolution and the access gate, run in front of every route.
//!
//! The session travels in the `agencyledger_session` cookie; API clients may
//! send the same token as `Authorization: Bearer`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde_json::json;

use agencyledger_auth::{
    Area, GateActor, GateDecision, Resolution, SignInSurface, classify, gate,
};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub const SESSION_COOKIE: &str = "agencyledger_session";

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").removal().into()
}

pub async fn session_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = session_token(req.headers());
    let ctx = match services.identity.resolve(token.as_deref(), Utc::now()).await {
        Ok(Resolution::Authenticated(account)) => RequestContext::authenticated(account),
        Ok(Resolution::Unauthenticated(reason)) => {
            if token.is_some() {
                tracing::debug!(?reason, "session not accepted");
            }
            RequestContext::anonymous()
        }
        Err(e) => return errors::directory_error_to_response(e),
    };

    let area = classify(req.uri().path());
    let decision = match ctx.account() {
        None => gate(None, area),
        Some(account) => {
            // Only the page areas care about the role.
            let membership = if matches!(area, Area::Owner(_) | Area::Team(_)) {
                match ctx.membership(&*services.directory).await {
                    Ok(m) => m,
                    Err(e) => return errors::directory_error_to_response(e),
                }
            } else {
                None
            };
            let actor = GateActor {
                kind: account.kind,
                role: membership.as_ref().map(|m| &m.role),
            };
            gate(Some(actor), area)
        }
    };

    match decision {
        GateDecision::Proceed => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        GateDecision::Redirect { to, reason } => {
            tracing::debug!(path = %req.uri().path(), to, ?reason, "gate redirect");
            Redirect::to(to).into_response()
        }
        GateDecision::LoginRequired => login_prompt(),
    }
}

fn login_prompt() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(json!({
            "error": "unauthenticated",
            "message": "sign in required",
            "sign_in": {
                "owner": SignInSurface::Owner.entry_path(),
                "team": SignInSurface::Team.entry_path(),
            },
        })),
    )
        .into_response()
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    extract_bearer(headers).map(str::to_string)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
