//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: directory, ledger store, engine and session codec
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
///
/// Every route, public ones included, sits behind the session middleware:
/// the gate decides per path whether to proceed, redirect or ask for a login.
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/", get(routes::system::health))
        .route("/health", get(routes::system::health))
        .merge(routes::auth_router())
        .merge(routes::pages_router())
        .nest("/api", routes::api_router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(services.clone()))
                .layer(axum::middleware::from_fn_with_state(
                    services,
                    middleware::session_middleware,
                )),
        )
}
