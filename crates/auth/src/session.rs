//! Session tokens: HS256-signed claims naming an account.
//!
//! The token carries identity only (account id + email). Account kind and
//! membership role are looked up fresh on every request, so a token can never
//! carry a stale kind or role.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agencyledger_core::AccountId;

/// Session claims model (transport-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the account the session belongs to.
    pub sub: AccountId,

    /// Email at the time the session was issued.
    pub email: String,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("session token rejected: {0}")]
    Rejected(String),

    #[error("failed to sign session: {0}")]
    Encode(String),
}

/// Deterministically validate session claims.
///
/// Signature checks happen in [`SessionCodec::decode`]; this only looks at the
/// time window.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), SessionError> {
    if claims.expires_at <= claims.issued_at {
        return Err(SessionError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(SessionError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(SessionError::Expired);
    }
    Ok(())
}

/// Signs and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(
        &self,
        account_id: AccountId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: account_id,
            email: email.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| SessionError::Encode(e.to_string()))
    }

    /// Verify the signature, then the time window.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        // Expiry lives in our own claim fields; jsonwebtoken's `exp` handling is off.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| SessionError::Rejected(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SessionCodec {
        SessionCodec::new(b"test-secret", Duration::minutes(30))
    }

    #[test]
    fn issued_token_decodes_within_window() {
        let now = Utc::now();
        let id = AccountId::new();
        let token = codec().issue(id, "a@example.com", now).unwrap();

        let claims = codec().decode(&token, now + Duration::minutes(5)).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let token = codec().issue(AccountId::new(), "a@example.com", now).unwrap();

        let err = codec().decode(&token, now + Duration::minutes(31)).unwrap_err();
        assert_eq!(err, SessionError::Expired);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let now = Utc::now();
        let other = SessionCodec::new(b"other-secret", Duration::minutes(30));
        let token = other.issue(AccountId::new(), "a@example.com", now).unwrap();

        assert!(matches!(codec().decode(&token, now), Err(SessionError::Rejected(_))));
    }

    #[test]
    fn inverted_time_window_is_invalid() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: AccountId::new(),
            email: "a@example.com".to_string(),
            issued_at: now,
            expires_at: now - Duration::seconds(1),
        };
        assert_eq!(validate_claims(&claims, now), Err(SessionError::InvalidTimeWindow));
    }

    #[test]
    fn future_issued_at_is_not_yet_valid() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: AccountId::new(),
            email: "a@example.com".to_string(),
            issued_at: now + Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        };
        assert_eq!(validate_claims(&claims, now), Err(SessionError::NotYetValid));
    }
}
