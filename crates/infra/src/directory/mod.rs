//! Account, organization and membership persistence.
//!
//! The auth crate's lookup traits ([`AccountDirectory`],
//! [`MembershipDirectory`]) are read-only. [`Directory`] adds the writes that
//! provisioning needs; writes are plain row inserts/updates of values the
//! pure provisioning functions already validated.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

use std::sync::Arc;

use async_trait::async_trait;

use agencyledger_auth::{
    Account, AccountDirectory, DirectoryError, Membership, MembershipDirectory, Organization,
    ProvisionedOwner,
};
use agencyledger_core::{AccountId, OrganizationId};

#[async_trait]
pub trait Directory: AccountDirectory + MembershipDirectory {
    async fn organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, DirectoryError>;

    /// The membership row of `account_id` in `organization_id`, active or not.
    async fn membership_row(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Membership>, DirectoryError>;

    /// Every membership row of an organization.
    async fn members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, DirectoryError>;

    /// Account, organization and owner membership, all or nothing.
    async fn save_owner(&self, provisioned: &ProvisionedOwner) -> Result<(), DirectoryError>;

    /// Account and its membership, all or nothing.
    async fn save_team_member(
        &self,
        account: &Account,
        membership: &Membership,
    ) -> Result<(), DirectoryError>;

    /// Overwrite role/status of an existing membership row.
    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<D> Directory for Arc<D>
where
    D: Directory + ?Sized,
{
    async fn organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, DirectoryError> {
        (**self).organization(id).await
    }

    async fn membership_row(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Membership>, DirectoryError> {
        (**self).membership_row(organization_id, account_id).await
    }

    async fn members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        (**self).members(organization_id).await
    }

    async fn save_owner(&self, provisioned: &ProvisionedOwner) -> Result<(), DirectoryError> {
        (**self).save_owner(provisioned).await
    }

    async fn save_team_member(
        &self,
        account: &Account,
        membership: &Membership,
    ) -> Result<(), DirectoryError> {
        (**self).save_team_member(account, membership).await
    }

    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        (**self).update_membership(membership).await
    }
}
