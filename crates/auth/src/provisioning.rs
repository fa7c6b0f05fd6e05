//! Account provisioning.
//!
//! Owner accounts come from self sign-up and bring their organization with
//! them; team-member accounts are created inside an existing organization.
//! Everything here is pure: callers persist the returned rows.
//!
//! Who may create, re-role or deactivate a membership is decided by
//! [`crate::policy::authorize`] on a [`Resource::membership`](crate::policy::Resource::membership);
//! the functions below only hold the membership invariants:
//! - Account kind is fixed at creation and never changes.
//! - Role `owner` is held exactly by the organization's owner-kind account,
//!   so it is never granted and the owner membership is never changed.
//! - Memberships are tenant-scoped: no cross-organization grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agencyledger_core::{AccountId, DomainError, DomainResult, Email, OrganizationId};

use crate::identity::{Account, AccountKind, Organization};
use crate::membership::{Membership, MembershipRole, MembershipStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSignUp {
    pub email: String,
    pub display_name: String,
    pub organization_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTeamMember {
    pub email: String,
    pub display_name: String,
    pub role: MembershipRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedOwner {
    pub account: Account,
    pub organization: Organization,
    pub membership: Membership,
}

// ─────────────────────────────────────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────────────────────────────────────

fn display_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("display name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Self sign-up: a new owner-kind account, its organization, and the owner
/// membership tying them together.
pub fn provision_owner(req: &OwnerSignUp, now: DateTime<Utc>) -> DomainResult<ProvisionedOwner> {
    let email = Email::parse(&req.email)?;
    let display_name = display_name(&req.display_name)?;
    let organization_name = req.organization_name.trim();
    if organization_name.is_empty() {
        return Err(DomainError::validation("organization name cannot be empty"));
    }

    let account = Account {
        id: AccountId::new(),
        email,
        kind: AccountKind::Owner,
        display_name,
        created_at: now,
    };
    let organization = Organization {
        id: OrganizationId::new(),
        name: organization_name.to_string(),
        owner_account_id: account.id,
        created_at: now,
    };
    let membership = Membership {
        account_id: account.id,
        organization_id: organization.id,
        role: MembershipRole::Owner,
        status: MembershipStatus::Active,
    };

    Ok(ProvisionedOwner {
        account,
        organization,
        membership,
    })
}

fn ensure_grantable(role: &MembershipRole) -> DomainResult<()> {
    if *role == MembershipRole::Owner {
        return Err(DomainError::invariant(
            "the owner role belongs to the organization's owner account",
        ));
    }
    Ok(())
}

/// Team-member account plus its membership in `organization_id`.
pub fn provision_team_member(
    organization_id: OrganizationId,
    req: &NewTeamMember,
    now: DateTime<Utc>,
) -> DomainResult<(Account, Membership)> {
    ensure_grantable(&req.role)?;
    let email = Email::parse(&req.email)?;
    let display_name = display_name(&req.display_name)?;

    let account = Account {
        id: AccountId::new(),
        email,
        kind: AccountKind::TeamMember,
        display_name,
        created_at: now,
    };
    let membership = Membership {
        account_id: account.id,
        organization_id,
        role: req.role.clone(),
        status: MembershipStatus::Active,
    };
    Ok((account, membership))
}

fn ensure_changeable(organization_id: OrganizationId, target: &Membership) -> DomainResult<()> {
    if target.organization_id != organization_id {
        return Err(DomainError::invariant("tenant mismatch"));
    }
    if target.role == MembershipRole::Owner {
        return Err(DomainError::invariant("the owner membership cannot be changed"));
    }
    if target.status == MembershipStatus::Inactive {
        return Err(DomainError::invariant("membership is inactive"));
    }
    Ok(())
}

/// Re-role an active team membership of `organization_id`.
pub fn change_role(
    organization_id: OrganizationId,
    target: &Membership,
    role: MembershipRole,
) -> DomainResult<Membership> {
    ensure_changeable(organization_id, target)?;
    ensure_grantable(&role)?;
    Ok(Membership {
        role,
        ..target.clone()
    })
}

/// Remove a team member's access without deleting the account.
pub fn deactivate(organization_id: OrganizationId, target: &Membership) -> DomainResult<Membership> {
    ensure_changeable(organization_id, target)?;
    Ok(Membership {
        status: MembershipStatus::Inactive,
        ..target.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn hire(role: MembershipRole) -> NewTeamMember {
        NewTeamMember {
            email: "sam@studio.test".to_string(),
            display_name: "Sam".to_string(),
            role,
        }
    }

    fn row(org: OrganizationId, role: MembershipRole) -> Membership {
        Membership {
            account_id: AccountId::new(),
            organization_id: org,
            role,
            status: MembershipStatus::Active,
        }
    }

    fn designer() -> MembershipRole {
        MembershipRole::functional("designer").unwrap()
    }

    #[test]
    fn sign_up_creates_owner_org_and_owner_membership() {
        let p = provision_owner(
            &OwnerSignUp {
                email: " Alice@Studio.Test ".to_string(),
                display_name: "Alice".to_string(),
                organization_name: "Studio".to_string(),
            },
            now(),
        )
        .unwrap();

        assert_eq!(p.account.kind, AccountKind::Owner);
        assert_eq!(p.account.email.as_str(), "alice@studio.test");
        assert_eq!(p.organization.owner_account_id, p.account.id);
        assert_eq!(p.membership.organization_id, p.organization.id);
        assert_eq!(p.membership.role, MembershipRole::Owner);
    }

    #[test]
    fn sign_up_rejects_blank_organization() {
        let err = provision_owner(
            &OwnerSignUp {
                email: "a@studio.test".to_string(),
                display_name: "A".to_string(),
                organization_name: "  ".to_string(),
            },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn team_member_lands_in_the_given_org() {
        let org = OrganizationId::new();
        let (account, membership) =
            provision_team_member(org, &hire(MembershipRole::Admin), now()).unwrap();

        assert_eq!(account.kind, AccountKind::TeamMember);
        assert_eq!(membership.account_id, account.id);
        assert_eq!(membership.organization_id, org);
        assert_eq!(membership.role, MembershipRole::Admin);
    }

    #[test]
    fn nobody_can_grant_owner_role() {
        let org = OrganizationId::new();
        assert!(matches!(
            provision_team_member(org, &hire(MembershipRole::Owner), now()),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            change_role(org, &row(org, designer()), MembershipRole::Owner),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn role_changes_stay_inside_the_tenant() {
        let err = change_role(
            OrganizationId::new(),
            &row(OrganizationId::new(), designer()),
            MembershipRole::Admin,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn admin_membership_can_be_re_roled() {
        let org = OrganizationId::new();
        let admin_row = row(org, MembershipRole::Admin);
        assert_eq!(change_role(org, &admin_row, designer()).unwrap().role, designer());
        assert_eq!(deactivate(org, &admin_row).unwrap().status, MembershipStatus::Inactive);
    }

    #[test]
    fn owner_membership_is_fixed() {
        let org = OrganizationId::new();
        let owner_row = row(org, MembershipRole::Owner);
        assert!(matches!(
            change_role(org, &owner_row, MembershipRole::Admin),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(deactivate(org, &owner_row), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn inactive_membership_is_not_deactivated_twice() {
        let org = OrganizationId::new();
        let gone = deactivate(org, &row(org, designer())).unwrap();
        assert!(matches!(deactivate(org, &gone), Err(DomainError::InvariantViolation(_))));
    }
}
