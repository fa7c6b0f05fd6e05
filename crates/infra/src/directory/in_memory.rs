use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use agencyledger_auth::{
    Account, AccountDirectory, DirectoryError, Membership, MembershipDirectory, MembershipStatus,
    Organization, ProvisionedOwner, TenantMembership, active_membership,
};
use agencyledger_core::{AccountId, OrganizationId};

use super::Directory;

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    /// Normalized email → account.
    emails: HashMap<String, AccountId>,
    organizations: HashMap<OrganizationId, Organization>,
    memberships: Vec<Membership>,
}

impl Tables {
    fn ensure_new_account(&self, account: &Account) -> Result<(), DirectoryError> {
        if self.accounts.contains_key(&account.id) {
            return Err(DirectoryError::Conflict(format!("account {} exists", account.id)));
        }
        if self.emails.contains_key(account.email.as_str()) {
            return Err(DirectoryError::Conflict(format!(
                "email {} is already registered",
                account.email
            )));
        }
        Ok(())
    }

    fn ensure_no_active_membership(&self, account_id: AccountId) -> Result<(), DirectoryError> {
        if self
            .memberships
            .iter()
            .any(|m| m.account_id == account_id && m.status == MembershipStatus::Active)
        {
            return Err(DirectoryError::Conflict(format!(
                "account {account_id} already has an active membership"
            )));
        }
        Ok(())
    }

    fn insert_account(&mut self, account: &Account) {
        self.emails
            .insert(account.email.as_str().to_string(), account.id);
        self.accounts.insert(account.id, account.clone());
    }
}

/// In-memory directory for tests/dev.
///
/// All tables sit behind one lock so multi-row saves are all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Tables>,
}

fn poisoned<T>(_: T) -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError> {
        Ok(self.inner.read().map_err(poisoned)?.accounts.get(&id).cloned())
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryDirectory {
    async fn membership_of(
        &self,
        account_id: AccountId,
    ) -> Result<Option<TenantMembership>, DirectoryError> {
        let rows: Vec<Membership> = self
            .inner
            .read()
            .map_err(poisoned)?
            .memberships
            .iter()
            .filter(|m| m.account_id == account_id)
            .cloned()
            .collect();
        Ok(active_membership(&rows)?)
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, DirectoryError> {
        Ok(self.inner.read().map_err(poisoned)?.organizations.get(&id).cloned())
    }

    async fn membership_row(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Membership>, DirectoryError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .memberships
            .iter()
            .find(|m| m.organization_id == organization_id && m.account_id == account_id)
            .cloned())
    }

    async fn members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .memberships
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn save_owner(&self, provisioned: &ProvisionedOwner) -> Result<(), DirectoryError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        tables.ensure_new_account(&provisioned.account)?;
        if tables.organizations.contains_key(&provisioned.organization.id) {
            return Err(DirectoryError::Conflict(format!(
                "organization {} exists",
                provisioned.organization.id
            )));
        }

        tables.insert_account(&provisioned.account);
        tables
            .organizations
            .insert(provisioned.organization.id, provisioned.organization.clone());
        tables.memberships.push(provisioned.membership.clone());
        Ok(())
    }

    async fn save_team_member(
        &self,
        account: &Account,
        membership: &Membership,
    ) -> Result<(), DirectoryError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        tables.ensure_new_account(account)?;
        if !tables.organizations.contains_key(&membership.organization_id) {
            return Err(DirectoryError::Inconsistent(format!(
                "organization {} does not exist",
                membership.organization_id
            )));
        }
        tables.ensure_no_active_membership(account.id)?;

        tables.insert_account(account);
        tables.memberships.push(membership.clone());
        Ok(())
    }

    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        let becomes_active = membership.status == MembershipStatus::Active;
        let clash = becomes_active
            && tables.memberships.iter().any(|m| {
                m.account_id == membership.account_id
                    && m.organization_id != membership.organization_id
                    && m.status == MembershipStatus::Active
            });
        if clash {
            return Err(DirectoryError::Conflict(format!(
                "account {} already has an active membership",
                membership.account_id
            )));
        }

        let row = tables
            .memberships
            .iter_mut()
            .find(|m| {
                m.account_id == membership.account_id
                    && m.organization_id == membership.organization_id
            })
            .ok_or_else(|| {
                DirectoryError::Inconsistent(format!(
                    "no membership for account {} in organization {}",
                    membership.account_id, membership.organization_id
                ))
            })?;
        row.role = membership.role.clone();
        row.status = membership.status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencyledger_auth::{MembershipRole, OwnerSignUp, provision_owner};
    use chrono::Utc;

    fn owner(email: &str) -> ProvisionedOwner {
        provision_owner(
            &OwnerSignUp {
                email: email.to_string(),
                display_name: "Olive".to_string(),
                organization_name: "Studio".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn saved_owner_resolves_to_owner_membership() {
        let dir = InMemoryDirectory::new();
        let p = owner("olive@studio.io");
        dir.save_owner(&p).await.unwrap();

        let m = dir.membership_of(p.account.id).await.unwrap().unwrap();
        assert_eq!(m.organization_id, p.organization.id);
        assert_eq!(m.role, MembershipRole::Owner);

        let org = dir.organization(p.organization.id).await.unwrap().unwrap();
        assert_eq!(org.owner_account_id, p.account.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_and_saves_nothing() {
        let dir = InMemoryDirectory::new();
        dir.save_owner(&owner("olive@studio.io")).await.unwrap();

        let second = owner("olive@studio.io");
        let err = dir.save_owner(&second).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict(_)));
        assert!(dir.organization(second.organization.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inactive_membership_resolves_to_no_tenant() {
        let dir = InMemoryDirectory::new();
        let p = owner("olive@studio.io");
        dir.save_owner(&p).await.unwrap();

        let mut row = p.membership.clone();
        row.status = MembershipStatus::Inactive;
        dir.update_membership(&row).await.unwrap();

        assert_eq!(dir.membership_of(p.account.id).await.unwrap(), None);
        assert_eq!(
            dir.membership_row(p.organization.id, p.account.id)
                .await
                .unwrap()
                .map(|m| m.status),
            Some(MembershipStatus::Inactive)
        );
    }
}
