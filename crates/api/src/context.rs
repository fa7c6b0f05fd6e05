use std::sync::Arc;

use tokio::sync::OnceCell;

use agencyledger_auth::{Account, Actor, DirectoryError, MembershipDirectory, TenantMembership};

/// Who is making the request.
///
/// Inserted by the session middleware. The membership lookup runs at most
/// once per request and the result lives only as long as the request does.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    account: Option<Account>,
    membership: Arc<OnceCell<Option<TenantMembership>>>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(account: Account) -> Self {
        Self {
            account: Some(account),
            membership: Arc::default(),
        }
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// The caller's active membership, looked up on first use.
    pub async fn membership<D>(
        &self,
        directory: &D,
    ) -> Result<Option<TenantMembership>, DirectoryError>
    where
        D: MembershipDirectory + ?Sized,
    {
        let Some(account) = &self.account else {
            return Ok(None);
        };
        self.membership
            .get_or_try_init(|| directory.membership_of(account.id))
            .await
            .cloned()
    }

    /// `None` for anonymous requests.
    pub async fn actor<D>(&self, directory: &D) -> Result<Option<Actor>, DirectoryError>
    where
        D: MembershipDirectory + ?Sized,
    {
        let membership = self.membership(directory).await?;
        Ok(self.account.as_ref().map(|a| Actor::new(a, membership)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use agencyledger_auth::{AccountKind, MembershipRole};
    use agencyledger_core::{AccountId, Email, OrganizationId};

    use super::*;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl MembershipDirectory for Counting {
        async fn membership_of(
            &self,
            _account_id: AccountId,
        ) -> Result<Option<TenantMembership>, DirectoryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(TenantMembership {
                organization_id: OrganizationId::new(),
                role: MembershipRole::Admin,
            }))
        }
    }

    fn account() -> Account {
        Account {
            id: AccountId::new(),
            email: Email::parse("ada@studio.test").unwrap(),
            kind: AccountKind::TeamMember,
            display_name: "Ada".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn membership_is_looked_up_once_per_request() {
        let directory = Counting::default();
        let ctx = RequestContext::authenticated(account());

        let first = ctx.membership(&directory).await.unwrap();
        let actor = ctx.clone().actor(&directory).await.unwrap().unwrap();
        assert_eq!(actor.membership, first);
        assert_eq!(directory.0.load(Ordering::SeqCst), 1);

        // A new request starts with an empty cache.
        let next = RequestContext::authenticated(account());
        next.membership(&directory).await.unwrap();
        assert_eq!(directory.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn anonymous_requests_never_hit_the_directory() {
        let directory = Counting::default();
        let ctx = RequestContext::anonymous();
        assert_eq!(ctx.actor(&directory).await.unwrap(), None);
        assert_eq!(directory.0.load(Ordering::SeqCst), 0);
    }
}
