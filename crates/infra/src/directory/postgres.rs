//! PostgreSQL directory.
//!
//! `membership_of` is the privileged lookup: one unrestricted query on
//! `memberships` keyed by account id, with no organization filter and no
//! policy check in front of it.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tracing::{Span, instrument};

use agencyledger_auth::{
    Account, AccountDirectory, DirectoryError, Membership, MembershipDirectory, Organization,
    ProvisionedOwner, TenantMembership, active_membership,
};
use agencyledger_core::{AccountId, Email, OrganizationId};

use super::Directory;

pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DirectoryError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| DirectoryError::Inconsistent(format!("failed to decode column {column}: {e}")))
}

fn account_from_row(row: &PgRow) -> Result<Account, DirectoryError> {
    Ok(Account {
        id: AccountId::from_uuid(get(row, "id")?),
        email: Email::parse(&get::<String>(row, "email")?)?,
        kind: get::<String>(row, "account_kind")?.parse()?,
        display_name: get(row, "display_name")?,
        created_at: get(row, "created_at")?,
    })
}

fn membership_from_row(row: &PgRow) -> Result<Membership, DirectoryError> {
    Ok(Membership {
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        role: get::<String>(row, "role")?.parse()?,
        status: get::<String>(row, "status")?.parse()?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DirectoryError::Conflict(msg),
                Some("23503") | Some("23514") => DirectoryError::Inconsistent(msg),
                _ => DirectoryError::Unavailable(msg),
            }
        }
        _ => DirectoryError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

const MEMBERSHIP_COLUMNS: &str = "account_id, organization_id, role, status";

async fn insert_account(
    tx: &mut sqlx::Transaction<'static, Postgres>,
    account: &Account,
) -> Result<(), DirectoryError> {
    sqlx::query(
        r#"
        INSERT INTO accounts (id, email, account_kind, display_name, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(account.id.as_uuid())
    .bind(account.email.as_str())
    .bind(account.kind.as_str())
    .bind(&account.display_name)
    .bind(account.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_account", e))?;
    Ok(())
}

async fn insert_membership(
    tx: &mut sqlx::Transaction<'static, Postgres>,
    membership: &Membership,
) -> Result<(), DirectoryError> {
    sqlx::query(
        r#"
        INSERT INTO memberships (account_id, organization_id, role, status)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(membership.account_id.as_uuid())
    .bind(membership.organization_id.as_uuid())
    .bind(membership.role.as_str())
    .bind(membership.status.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_membership", e))?;
    Ok(())
}

#[async_trait]
impl AccountDirectory for PostgresDirectory {
    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("account", e))?;
        row.as_ref().map(account_from_row).transpose()
    }

}

#[async_trait]
impl MembershipDirectory for PostgresDirectory {
    #[instrument(skip(self), fields(operation = tracing::field::Empty, account_id = %account_id), err)]
    async fn membership_of(
        &self,
        account_id: AccountId,
    ) -> Result<Option<TenantMembership>, DirectoryError> {
        Span::current().record("operation", "membership_of");

        let rows = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE account_id = $1"
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("membership_of", e))?;

        let rows = rows
            .iter()
            .map(membership_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(active_membership(&rows)?)
    }
}

#[async_trait]
impl Directory for PostgresDirectory {
    #[instrument(skip(self), fields(organization_id = %id), err)]
    async fn organization(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, DirectoryError> {
        let row = sqlx::query("SELECT * FROM organizations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("organization", e))?;

        row.map(|row| {
            Ok(Organization {
                id: OrganizationId::from_uuid(get(&row, "id")?),
                name: get(&row, "name")?,
                owner_account_id: AccountId::from_uuid(get(&row, "owner_account_id")?),
                created_at: get(&row, "created_at")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, account_id = %account_id), err)]
    async fn membership_row(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Membership>, DirectoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE organization_id = $1 AND account_id = $2"
        ))
        .bind(organization_id.as_uuid())
        .bind(account_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("membership_row", e))?;
        row.as_ref().map(membership_from_row).transpose()
    }

    #[instrument(skip(self), fields(organization_id = %organization_id), err)]
    async fn members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE organization_id = $1 ORDER BY created_at"
        ))
        .bind(organization_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("members", e))?;
        rows.iter().map(membership_from_row).collect()
    }

    #[instrument(
        skip(self, provisioned),
        fields(
            account_id = %provisioned.account.id,
            organization_id = %provisioned.organization.id
        ),
        err
    )]
    async fn save_owner(&self, provisioned: &ProvisionedOwner) -> Result<(), DirectoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_account(&mut tx, &provisioned.account).await?;
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, owner_account_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(provisioned.organization.id.as_uuid())
        .bind(&provisioned.organization.name)
        .bind(provisioned.organization.owner_account_id.as_uuid())
        .bind(provisioned.organization.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_organization", e))?;
        insert_membership(&mut tx, &provisioned.membership).await?;

        // Dropping `tx` on an early return rolls back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, account, membership),
        fields(account_id = %account.id, organization_id = %membership.organization_id),
        err
    )]
    async fn save_team_member(
        &self,
        account: &Account,
        membership: &Membership,
    ) -> Result<(), DirectoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_account(&mut tx, account).await?;
        insert_membership(&mut tx, membership).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, membership),
        fields(account_id = %membership.account_id, organization_id = %membership.organization_id),
        err
    )]
    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        let updated = sqlx::query(
            r#"
            UPDATE memberships SET role = $3, status = $4
            WHERE account_id = $1 AND organization_id = $2
            "#,
        )
        .bind(membership.account_id.as_uuid())
        .bind(membership.organization_id.as_uuid())
        .bind(membership.role.as_str())
        .bind(membership.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_membership", e))?
        .rows_affected();

        if updated == 0 {
            return Err(DirectoryError::Inconsistent(format!(
                "no membership for account {} in organization {}",
                membership.account_id, membership.organization_id
            )));
        }
        Ok(())
    }
}
