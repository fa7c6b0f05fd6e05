use axum::{Router, routing::get};

pub mod areas;
pub mod auth;
pub mod ledger;
pub mod projects;
pub mod rbac;
pub mod system;
pub mod team;

/// Router for the JSON API, mounted under `/api`.
pub fn api_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(ledger::router())
        .merge(projects::router())
        .nest("/team-members", team::router())
        .nest("/authz", rbac::router())
}

/// Sign-in entry points, sign-up and sign-out.
pub fn auth_router() -> Router {
    auth::router()
}

/// Owner and team area pages.
pub fn pages_router() -> Router {
    areas::router()
}
