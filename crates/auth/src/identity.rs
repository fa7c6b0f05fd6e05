//! Identity resolution: raw session → account (with its kind), or
//! `Unauthenticated`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agencyledger_core::{AccountId, DomainError, Email, Entity, OrganizationId, TenantOwned};

use crate::membership::DirectoryError;
use crate::session::{SessionCodec, SessionError};

/// How an account was provisioned. Set at creation, never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Signed up on their own and created an organization.
    Owner,
    /// Created by an owner/admin inside an existing organization.
    TeamMember,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Owner => "owner",
            AccountKind::TeamMember => "team_member",
        }
    }

    /// The only sign-in surface this kind may use.
    pub fn sign_in_surface(&self) -> SignInSurface {
        match self {
            AccountKind::Owner => SignInSurface::Owner,
            AccountKind::TeamMember => SignInSurface::Team,
        }
    }
}

impl core::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AccountKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(AccountKind::Owner),
            "team_member" => Ok(AccountKind::TeamMember),
            other => Err(DomainError::validation(format!("unknown account kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: Email,
    pub kind: AccountKind,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub owner_account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Entity for Organization {
    type Id = OrganizationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantOwned for Organization {
    fn organization_id(&self) -> OrganizationId {
        self.id
    }
}

/// The two distinct sign-in entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInSurface {
    Owner,
    Team,
}

impl SignInSurface {
    pub fn entry_path(&self) -> &'static str {
        match self {
            SignInSurface::Owner => "/auth/sign-in",
            SignInSurface::Team => "/auth/team/sign-in",
        }
    }
}

impl core::fmt::Display for SignInSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SignInSurface::Owner => f.write_str("owner"),
            SignInSurface::Team => f.write_str("team"),
        }
    }
}

/// Credentials presented at the wrong sign-in surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} accounts must sign in at the {expected} entry point")]
pub struct SurfaceMismatch {
    pub kind: AccountKind,
    pub expected: SignInSurface,
}

/// Admit an already-identified account at a sign-in surface.
///
/// Hard rule: an owner at the team surface (or the reverse) is rejected right
/// after identity resolution, before any session exists.
pub fn admit(account: &Account, surface: SignInSurface) -> Result<(), SurfaceMismatch> {
    let expected = account.kind.sign_in_surface();
    if expected != surface {
        return Err(SurfaceMismatch {
            kind: account.kind,
            expected,
        });
    }
    Ok(())
}

/// Why a session did not resolve to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthenticatedReason {
    MissingSession,
    InvalidSession,
    Expired,
    UnknownAccount,
    /// The account's email changed after the session was issued.
    StaleSession,
}

/// Outcome of identity resolution. `Unauthenticated` is an expected branch,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Authenticated(Account),
    Unauthenticated(UnauthenticatedReason),
}

impl Resolution {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Resolution::Authenticated(a) => Some(a),
            Resolution::Unauthenticated(_) => None,
        }
    }
}

/// Account lookups used by identity resolution and sign-in.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError>;
}

#[async_trait]
impl<D> AccountDirectory for Arc<D>
where
    D: AccountDirectory + ?Sized,
{
    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError> {
        (**self).account(id).await
    }
}

/// Resolves session tokens to accounts.
#[derive(Debug, Clone)]
pub struct IdentityResolver<D> {
    codec: SessionCodec,
    accounts: D,
}

impl<D> IdentityResolver<D>
where
    D: AccountDirectory,
{
    pub fn new(codec: SessionCodec, accounts: D) -> Self {
        Self { codec, accounts }
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    pub fn accounts(&self) -> &D {
        &self.accounts
    }

    /// `resolve(session) → Account | Unauthenticated`.
    ///
    /// Only a directory outage is an `Err`.
    pub async fn resolve(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, DirectoryError> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Resolution::Unauthenticated(UnauthenticatedReason::MissingSession));
        };

        let claims = match self.codec.decode(token, now) {
            Ok(c) => c,
            Err(SessionError::Expired) => {
                return Ok(Resolution::Unauthenticated(UnauthenticatedReason::Expired));
            }
            Err(e) => {
                tracing::debug!(error = %e, "session rejected");
                return Ok(Resolution::Unauthenticated(UnauthenticatedReason::InvalidSession));
            }
        };

        let Some(account) = self.accounts.account(claims.sub).await? else {
            return Ok(Resolution::Unauthenticated(UnauthenticatedReason::UnknownAccount));
        };

        if !account.email.as_str().eq_ignore_ascii_case(claims.email.trim()) {
            return Ok(Resolution::Unauthenticated(UnauthenticatedReason::StaleSession));
        }

        Ok(Resolution::Authenticated(account))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Duration;

    use super::*;

    #[derive(Default)]
    struct Accounts(HashMap<AccountId, Account>);

    #[async_trait]
    impl AccountDirectory for Accounts {
        async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError> {
            Ok(self.0.get(&id).cloned())
        }
    }

    fn account(kind: AccountKind) -> Account {
        Account {
            id: AccountId::new(),
            email: Email::parse("pat@studio.test").unwrap(),
            kind,
            display_name: "Pat".to_string(),
            created_at: Utc::now(),
        }
    }

    fn resolver(accounts: Vec<Account>) -> IdentityResolver<Accounts> {
        let map = accounts.into_iter().map(|a| (a.id, a)).collect();
        IdentityResolver::new(SessionCodec::new(b"s", Duration::minutes(10)), Accounts(map))
    }

    #[test]
    fn owner_is_rejected_at_team_surface() {
        let owner = account(AccountKind::Owner);
        let err = admit(&owner, SignInSurface::Team).unwrap_err();
        assert_eq!(err.expected, SignInSurface::Owner);
        assert!(admit(&owner, SignInSurface::Owner).is_ok());
    }

    #[test]
    fn team_member_is_rejected_at_owner_surface() {
        let member = account(AccountKind::TeamMember);
        let err = admit(&member, SignInSurface::Owner).unwrap_err();
        assert_eq!(err.expected, SignInSurface::Team);
    }

    #[tokio::test]
    async fn valid_session_resolves_account_with_its_kind() {
        let member = account(AccountKind::TeamMember);
        let resolver = resolver(vec![member.clone()]);
        let now = Utc::now();
        let token = resolver.codec().issue(member.id, member.email.as_str(), now).unwrap();

        let resolution = resolver.resolve(Some(&token), now).await.unwrap();
        assert_eq!(resolution.account().map(|a| a.kind), Some(AccountKind::TeamMember));
    }

    #[tokio::test]
    async fn missing_or_garbage_sessions_are_unauthenticated() {
        let resolver = resolver(vec![]);
        let now = Utc::now();
        assert_eq!(
            resolver.resolve(None, now).await.unwrap(),
            Resolution::Unauthenticated(UnauthenticatedReason::MissingSession)
        );
        assert_eq!(
            resolver.resolve(Some("garbage"), now).await.unwrap(),
            Resolution::Unauthenticated(UnauthenticatedReason::InvalidSession)
        );
    }

    #[tokio::test]
    async fn expired_and_unknown_sessions_are_unauthenticated() {
        let ghost = account(AccountKind::Owner);
        let resolver = resolver(vec![]);
        let now = Utc::now();
        let token = resolver.codec().issue(ghost.id, ghost.email.as_str(), now).unwrap();

        assert_eq!(
            resolver.resolve(Some(&token), now).await.unwrap(),
            Resolution::Unauthenticated(UnauthenticatedReason::UnknownAccount)
        );
        assert_eq!(
            resolver.resolve(Some(&token), now + Duration::minutes(11)).await.unwrap(),
            Resolution::Unauthenticated(UnauthenticatedReason::Expired)
        );
    }

    #[tokio::test]
    async fn email_change_invalidates_old_sessions() {
        let owner = account(AccountKind::Owner);
        let resolver = resolver(vec![owner.clone()]);
        let now = Utc::now();
        let token = resolver.codec().issue(owner.id, "old@studio.test", now).unwrap();

        assert_eq!(
            resolver.resolve(Some(&token), now).await.unwrap(),
            Resolution::Unauthenticated(UnauthenticatedReason::StaleSession)
        );
    }
}
