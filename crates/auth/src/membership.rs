//! Tenant membership: which organization an account belongs to, and its role.
//!
//! The resolver contract ([`MembershipDirectory::membership_of`]) is the one
//! place the authorization model reads membership rows. It is a privileged,
//! single-key lookup: implementations read the membership table directly by
//! account id and must never go through [`crate::policy`] or any
//! actor-filtered view of the same table. The policy layer consumes its result;
//! it never feeds back into it, so evaluation cannot recurse.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agencyledger_core::{AccountId, DomainError, DomainResult, OrganizationId};

/// Permission level of an account inside one organization.
///
/// Independent of [`crate::AccountKind`]: kind says how the account was
/// provisioned, role says what it may do in its organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MembershipRole {
    Owner,
    Admin,
    /// Designer, developer, copywriter, ... Read-only on assigned work.
    Functional(FunctionalRole),
}

/// Opaque functional role name (lowercase slug).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionalRole(Cow<'static, str>);

impl FunctionalRole {
    pub fn new(name: impl Into<Cow<'static, str>>) -> DomainResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(DomainError::validation(format!(
                "functional role '{name}' must be a lowercase slug"
            )));
        }
        if name == "owner" || name == "admin" {
            return Err(DomainError::validation(format!(
                "'{name}' is not a functional role"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl MembershipRole {
    pub fn functional(name: &'static str) -> DomainResult<Self> {
        Ok(Self::Functional(FunctionalRole::new(name)?))
    }

    pub fn as_str(&self) -> &str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Functional(r) => r.as_str(),
        }
    }
}

impl core::str::FromStr for MembershipRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(MembershipRole::Owner),
            "admin" => Ok(MembershipRole::Admin),
            other => Ok(MembershipRole::Functional(FunctionalRole::new(other.to_string())?)),
        }
    }
}

impl TryFrom<String> for MembershipRole {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MembershipRole> for String {
    fn from(value: MembershipRole) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
        }
    }
}

impl core::str::FromStr for MembershipStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "inactive" => Ok(MembershipStatus::Inactive),
            other => Err(DomainError::validation(format!("unknown membership status '{other}'"))),
        }
    }
}

/// A membership row: (account, organization, role, status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub account_id: AccountId,
    pub organization_id: OrganizationId,
    pub role: MembershipRole,
    pub status: MembershipStatus,
}

/// Result of resolving an account's tenant: the organization and the role held there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub organization_id: OrganizationId,
    pub role: MembershipRole,
}

/// Pick the single active membership out of an account's rows.
///
/// No active row is `Ok(None)` ("no tenant"). More than one active row breaks
/// the one-organization-per-account invariant and is reported, not guessed at.
pub fn active_membership(rows: &[Membership]) -> DomainResult<Option<TenantMembership>> {
    let mut active = rows.iter().filter(|m| m.status == MembershipStatus::Active);
    let Some(first) = active.next() else {
        return Ok(None);
    };
    if active.next().is_some() {
        return Err(DomainError::invariant(format!(
            "account {} has more than one active membership",
            first.account_id
        )));
    }
    Ok(Some(TenantMembership {
        organization_id: first.organization_id,
        role: first.role.clone(),
    }))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("directory data is inconsistent: {0}")]
    Inconsistent(String),

    /// Duplicate email, second owner, second active membership.
    #[error("directory conflict: {0}")]
    Conflict(String),
}

impl From<DomainError> for DirectoryError {
    fn from(value: DomainError) -> Self {
        DirectoryError::Inconsistent(value.to_string())
    }
}

/// Privileged membership lookup.
///
/// Implementations perform exactly one unrestricted read keyed by `account_id`.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn membership_of(
        &self,
        account_id: AccountId,
    ) -> Result<Option<TenantMembership>, DirectoryError>;
}

#[async_trait]
impl<D> MembershipDirectory for Arc<D>
where
    D: MembershipDirectory + ?Sized,
{
    async fn membership_of(
        &self,
        account_id: AccountId,
    ) -> Result<Option<TenantMembership>, DirectoryError> {
        (**self).membership_of(account_id).await
    }
}
