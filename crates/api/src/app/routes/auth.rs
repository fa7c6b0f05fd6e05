//! Sign-in surfaces, owner sign-up and sign-out.
//!
//! Credential checking belongs to the external sign-in provider; what arrives
//! here is its signed identity assertion. A session cookie is only set after
//! the account has been admitted at the surface matching its kind.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{info, warn};

use agencyledger_auth::{OwnerSignUp, Resolution, SignInSurface, admit, home_path, provision_owner};

use crate::app::dto::{self, AccountView};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::middleware::{clear_session_cookie, session_cookie};

pub fn router() -> Router {
    Router::new()
        .route("/auth/sign-in", get(owner_sign_in_page).post(owner_sign_in))
        .route("/auth/team/sign-in", get(team_sign_in_page).post(team_sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-out", post(sign_out))
}

// ─────────────────────────────────────────────────────────────────────────────
// Sign-in
// ─────────────────────────────────────────────────────────────────────────────

pub async fn owner_sign_in_page(Query(query): Query<dto::SignInQuery>) -> axum::response::Response {
    sign_in_page(SignInSurface::Owner, query)
}

pub async fn team_sign_in_page(Query(query): Query<dto::SignInQuery>) -> axum::response::Response {
    sign_in_page(SignInSurface::Team, query)
}

fn sign_in_page(surface: SignInSurface, query: dto::SignInQuery) -> axum::response::Response {
    Json(serde_json::json!({
        "surface": surface,
        "action": surface.entry_path(),
        "error": query.error,
    }))
    .into_response()
}

/// POST /auth/sign-in - owner accounts only
pub async fn owner_sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    jar: CookieJar,
    Form(form): Form<dto::SignInForm>,
) -> axum::response::Response {
    sign_in(&services, SignInSurface::Owner, jar, form).await
}

/// POST /auth/team/sign-in - team-member accounts only
pub async fn team_sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    jar: CookieJar,
    Form(form): Form<dto::SignInForm>,
) -> axum::response::Response {
    sign_in(&services, SignInSurface::Team, jar, form).await
}

async fn sign_in(
    services: &AppServices,
    surface: SignInSurface,
    jar: CookieJar,
    form: dto::SignInForm,
) -> axum::response::Response {
    let now = Utc::now();
    let account = match services.identity.resolve(Some(&form.assertion), now).await {
        Ok(Resolution::Authenticated(account)) => account,
        Ok(Resolution::Unauthenticated(reason)) => {
            info!(%surface, ?reason, "sign-in rejected");
            return back_to(surface, "invalid_assertion");
        }
        Err(e) => return errors::directory_error_to_response(e),
    };

    if let Err(mismatch) = admit(&account, surface) {
        warn!(
            account_id = %account.id,
            account_kind = %mismatch.kind,
            %surface,
            "sign-in at the wrong surface"
        );
        return back_to(mismatch.expected, "wrong_surface");
    }

    let token = match services.sessions().issue(account.id, account.email.as_str(), now) {
        Ok(t) => t,
        Err(e) => return errors::session_error_to_response(e),
    };

    info!(account_id = %account.id, %surface, "signed in");
    (jar.add(session_cookie(token)), Redirect::to(home_path(account.kind))).into_response()
}

fn back_to(surface: SignInSurface, error: &str) -> axum::response::Response {
    Redirect::to(&format!("{}?error={error}", surface.entry_path())).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Sign-up / sign-out
// ─────────────────────────────────────────────────────────────────────────────

/// POST /auth/sign-up - create an owner account together with its organization
pub async fn sign_up(
    Extension(services): Extension<Arc<AppServices>>,
    jar: CookieJar,
    Json(body): Json<OwnerSignUp>,
) -> axum::response::Response {
    let now = Utc::now();
    let provisioned = match provision_owner(&body, now) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.directory.save_owner(&provisioned).await {
        return errors::directory_error_to_response(e);
    }

    let account = &provisioned.account;
    let token = match services.sessions().issue(account.id, account.email.as_str(), now) {
        Ok(t) => t,
        Err(e) => return errors::session_error_to_response(e),
    };

    info!(
        account_id = %account.id,
        organization_id = %provisioned.organization.id,
        "owner signed up"
    );
    (
        StatusCode::CREATED,
        jar.add(session_cookie(token)),
        Json(serde_json::json!({
            "account": AccountView::from(account),
            "organization": provisioned.organization,
        })),
    )
        .into_response()
}

/// POST /auth/sign-out
pub async fn sign_out(jar: CookieJar) -> axum::response::Response {
    (jar.add(clear_session_cookie()), Redirect::to("/")).into_response()
}
