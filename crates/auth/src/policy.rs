use serde::{Deserialize, Serialize};
use thiserror::Error;

use agencyledger_core::{AccountId, OrganizationId};

use crate::identity::{Account, AccountKind};
use crate::membership::{MembershipRole, TenantMembership};

/// A fully resolved actor for authorization decisions.
///
/// Built from an account plus the result of the privileged membership lookup;
/// evaluation itself never touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub account_id: AccountId,
    pub kind: AccountKind,
    pub membership: Option<TenantMembership>,
}

impl Actor {
    pub fn new(account: &Account, membership: Option<TenantMembership>) -> Self {
        Self {
            account_id: account.id,
            kind: account.kind,
            membership,
        }
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.membership.as_ref().map(|m| m.organization_id)
    }

    pub fn role(&self) -> Option<&MembershipRole> {
        self.membership.as_ref().map(|m| &m.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Organization,
    Membership,
    Client,
    Project,
    Task,
    Assignment,
    Expense,
    Payment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Organization => "organization",
            ResourceKind::Membership => "membership",
            ResourceKind::Client => "client",
            ResourceKind::Project => "project",
            ResourceKind::Task => "task",
            ResourceKind::Assignment => "assignment",
            ResourceKind::Expense => "expense",
            ResourceKind::Payment => "payment",
        }
    }

    /// Kinds a functional role may read when it is among the assignees.
    fn is_assignable(&self) -> bool {
        matches!(
            self,
            ResourceKind::Project
                | ResourceKind::Task
                | ResourceKind::Assignment
                | ResourceKind::Payment
                | ResourceKind::Membership
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// The thing being accessed, described by what the policy needs to know:
/// its organization, who it is assigned to, and (for memberships) the role it
/// grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub assignees: Vec<AccountId>,
    #[serde(default)]
    pub subject_role: Option<MembershipRole>,
}

impl Resource {
    pub fn organization(organization_id: OrganizationId) -> Self {
        Self::org_wide(ResourceKind::Organization, organization_id)
    }

    /// A resource with no individual assignee (clients, expenses, new projects).
    pub fn org_wide(kind: ResourceKind, organization_id: OrganizationId) -> Self {
        Self {
            kind,
            organization_id,
            assignees: Vec::new(),
            subject_role: None,
        }
    }

    pub fn assigned(
        kind: ResourceKind,
        organization_id: OrganizationId,
        assignees: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        Self {
            kind,
            organization_id,
            assignees: assignees.into_iter().collect(),
            subject_role: None,
        }
    }

    pub fn membership(
        organization_id: OrganizationId,
        account_id: AccountId,
        role: MembershipRole,
    ) -> Self {
        Self {
            kind: ResourceKind::Membership,
            organization_id,
            assignees: vec![account_id],
            subject_role: Some(role),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyKind {
    NoMembership,
    CrossTenant,
    OrganizationDeletion,
    ProtectedOwner,
    ReadOnlyRole,
    NotAssigned,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct DenyReason {
    pub kind: DenyKind,
    pub message: String,
}

impl DenyReason {
    fn new(kind: DenyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Evaluate the tenancy rules for `(actor, resource, action)`.
///
/// - No IO
/// - No panics
/// - Cross-organization access is denied before any role is looked at
pub fn evaluate(actor: &Actor, resource: &Resource, action: Action) -> Decision {
    let Some(membership) = &actor.membership else {
        return Decision::Deny(DenyReason::new(
            DenyKind::NoMembership,
            "account has no active organization membership",
        ));
    };

    if membership.organization_id != resource.organization_id {
        return Decision::Deny(DenyReason::new(
            DenyKind::CrossTenant,
            "resource belongs to a different organization",
        ));
    }

    match &membership.role {
        MembershipRole::Owner => Decision::Allow,
        MembershipRole::Admin => evaluate_admin(resource, action),
        MembershipRole::Functional(role) => {
            if action != Action::Read {
                return Decision::Deny(DenyReason::new(
                    DenyKind::ReadOnlyRole,
                    format!("role '{}' cannot {} {}", role.as_str(), action.as_str(), resource.kind.as_str()),
                ));
            }
            if resource.kind.is_assignable() && resource.assignees.contains(&actor.account_id) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::new(
                    DenyKind::NotAssigned,
                    format!("{} is not assigned to this account", resource.kind.as_str()),
                ))
            }
        }
    }
}

fn evaluate_admin(resource: &Resource, action: Action) -> Decision {
    if resource.kind == ResourceKind::Organization && action == Action::Delete {
        return Decision::Deny(DenyReason::new(
            DenyKind::OrganizationDeletion,
            "only the owner can delete the organization",
        ));
    }

    let touches_owner = resource.kind == ResourceKind::Membership
        && resource.subject_role == Some(MembershipRole::Owner)
        && matches!(action, Action::Update | Action::Delete);
    if touches_owner {
        return Decision::Deny(DenyReason::new(
            DenyKind::ProtectedOwner,
            "admins cannot demote or remove the owner",
        ));
    }

    Decision::Allow
}

/// [`evaluate`] plus a `warn` log line for every denial.
pub fn authorize(actor: &Actor, resource: &Resource, action: Action) -> Decision {
    let decision = evaluate(actor, resource, action);
    if let Decision::Deny(reason) = &decision {
        tracing::warn!(
            account_id = %actor.account_id,
            resource = resource.kind.as_str(),
            resource_organization_id = %resource.organization_id,
            action = action.as_str(),
            deny = ?reason.kind,
            "access denied"
        );
    }
    decision
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed, serializable explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub action: Action,
    pub resource_kind: ResourceKind,
    pub granted: bool,
    pub reason: String,
    pub actor: ActorState,
    pub resource_organization_id: OrganizationId,
    pub denial: Option<DenyReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActorState {
    pub account_id: AccountId,
    pub account_kind: AccountKind,
    pub organization_id: Option<OrganizationId>,
    pub role: Option<String>,
    pub assigned: bool,
}

/// Explain why an authorization decision was made (or would be made).
pub fn explain(actor: &Actor, resource: &Resource, action: Action) -> AuthorizationExplanation {
    let decision = evaluate(actor, resource, action);
    let state = ActorState {
        account_id: actor.account_id,
        account_kind: actor.kind,
        organization_id: actor.organization_id(),
        role: actor.role().map(|r| r.as_str().to_string()),
        assigned: resource.assignees.contains(&actor.account_id),
    };

    let (granted, reason, denial) = match decision {
        Decision::Allow => {
            let reason = match actor.role() {
                Some(MembershipRole::Owner) => "owner has full access within the organization".to_string(),
                Some(MembershipRole::Admin) => "admin has full access except owner-protected operations".to_string(),
                Some(role) => format!("role '{}' may read resources assigned to it", role.as_str()),
                None => "allowed".to_string(),
            };
            (true, reason, None)
        }
        Decision::Deny(d) => (false, d.message.clone(), Some(d)),
    };

    AuthorizationExplanation {
        action,
        resource_kind: resource.kind,
        granted,
        reason,
        actor: state,
        resource_organization_id: resource.organization_id,
        denial,
    }
}
