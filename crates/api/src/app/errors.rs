use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use agencyledger_auth::{DenyReason, DirectoryError, SessionError};
use agencyledger_core::DomainError;
use agencyledger_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        LedgerError::ConsistencyViolation(msg) => {
            json_error(StatusCode::CONFLICT, "consistency_violation", msg)
        }
        LedgerError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LedgerError::NoMembership => json_error(
            StatusCode::FORBIDDEN,
            "no_membership",
            "account has no active organization membership",
        ),
        LedgerError::Denied(reason) => deny_to_response(reason),
        LedgerError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg),
        LedgerError::Directory(e) => directory_error_to_response(e),
        LedgerError::Store(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::ConsistencyViolation(_) | DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
    };
    if err.is_fatal() {
        tracing::error!(error = %err, "consistency violation");
    } else if err == DomainError::Unauthorized {
        tracing::warn!("request denied by domain rules");
    }
    json_error(status, err.code(), err.to_string())
}

pub fn directory_error_to_response(err: DirectoryError) -> axum::response::Response {
    match err {
        DirectoryError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DirectoryError::Unavailable(msg) => {
            tracing::error!(error = %msg, "directory unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "directory_unavailable", msg)
        }
        DirectoryError::Inconsistent(msg) => {
            tracing::error!(error = %msg, "directory data inconsistent");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "directory_inconsistent", msg)
        }
    }
}

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    tracing::error!(error = %err, "failed to issue session");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "session_error", err.to_string())
}

/// `403` carrying the machine-readable denial kind next to the message.
pub fn deny_to_response(reason: DenyReason) -> axum::response::Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({
            "error": "forbidden",
            "reason": reason.kind,
            "message": reason.message,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use agencyledger_auth::DenyKind;

    use super::*;

    #[test]
    fn ledger_errors_map_to_their_status() {
        let cases = [
            (LedgerError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::ConsistencyViolation("x".into()), StatusCode::CONFLICT),
            (LedgerError::NotFound, StatusCode::NOT_FOUND),
            (LedgerError::NoMembership, StatusCode::FORBIDDEN),
            (
                LedgerError::Denied(DenyReason {
                    kind: DenyKind::CrossTenant,
                    message: "x".into(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                LedgerError::Directory(DirectoryError::Unavailable("x".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (LedgerError::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ledger_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn provisioning_errors_keep_their_domain_status() {
        assert_eq!(
            domain_error_to_response(DomainError::Unauthorized).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            domain_error_to_response(DomainError::conflict("email taken")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            domain_error_to_response(DomainError::invalid_id("x")).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
