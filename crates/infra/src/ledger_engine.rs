//! Ledger operations behind the access check.
//!
//! ```text
//! request (actor, target)
//!   ↓
//! 1. Resolve the target's organization and assignees (unscoped read)
//!   ↓
//! 2. Authorize Create / Delete / Update / Read on that resource
//!   ↓
//! 3. Organization-scoped store call: lock, validate, write, re-sum, commit
//!   ↓
//! 4. Log the resulting totals
//! ```
//!
//! The engine holds no ledger state of its own. Every derived total comes
//! back from the store's transaction; nothing here reads a total, adjusts it
//! and writes it back.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, instrument};

use agencyledger_auth::{
    Action, Actor, DenyKind, DenyReason, DirectoryError, MembershipDirectory, Resource,
    ResourceKind, authorize,
};
use agencyledger_core::{AccountId, ClientId, DomainError, OrganizationId, PaymentId, ProjectId};
use agencyledger_ledger::{
    Assignment, Earnings, Expense, ExpenseType, LedgerUpdate, NewPayment, Payment, PaymentTarget,
    Project, ProjectSummary, RecomputeOutcome, Task, earnings,
};

use crate::store::{LedgerStore, StoreError, Subject};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Rejected input; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A re-summed total was negative or overflowed; the mutation was aborted.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor has no active membership, so there is no organization to act in.
    #[error("account has no active organization membership")]
    NoMembership,

    #[error("access denied: {0}")]
    Denied(DenyReason),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("storage backend error: {0}")]
    Store(String),
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InvariantViolation(msg) => LedgerError::InvariantViolation(msg),
            DomainError::ConsistencyViolation(msg) => LedgerError::ConsistencyViolation(msg),
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
            DomainError::Unauthorized => LedgerError::Denied(DenyReason {
                kind: DenyKind::ReadOnlyRole,
                message: "not permitted".to_string(),
            }),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => e.into(),
            StoreError::TenantIsolation(msg) => LedgerError::TenantIsolation(msg),
            StoreError::Backend(msg) => LedgerError::Store(msg),
        }
    }
}

impl From<DenyReason> for LedgerError {
    fn from(value: DenyReason) -> Self {
        LedgerError::Denied(value)
    }
}

/// New team assignment on a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub project_id: ProjectId,
    pub account_id: AccountId,
    pub role: String,
    pub allocated_budget: Option<i64>,
}

#[derive(Debug)]
pub struct LedgerEngine<S, D> {
    store: S,
    memberships: D,
}

impl<S, D> LedgerEngine<S, D> {
    pub fn new(store: S, memberships: D) -> Self {
        Self { store, memberships }
    }
}

impl<S, D> LedgerEngine<S, D>
where
    S: LedgerStore,
    D: MembershipDirectory,
{
    async fn subject(&self, target: PaymentTarget) -> Result<Subject, LedgerError> {
        self.store
            .subject(target)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    fn acting_organization(actor: &Actor) -> Result<OrganizationId, LedgerError> {
        actor.organization_id().ok_or(LedgerError::NoMembership)
    }

    fn check(actor: &Actor, resource: &Resource, action: Action) -> Result<(), LedgerError> {
        Ok(authorize(actor, resource, action).into_result()?)
    }

    fn log_failure(operation: &'static str, err: &LedgerError) {
        if let LedgerError::ConsistencyViolation(msg) = err {
            error!(operation, reason = %msg, "ledger consistency violation, mutation aborted");
        }
    }

    // ─── Payments ───────────────────────────────────────────────────────────

    /// `record_payment(scope, target, amount, type, date) → Payment`, followed
    /// by synchronous recomputation of every total reachable from the target.
    #[instrument(
        skip(self, actor, payment, now),
        fields(account_id = %actor.account_id, target = %payment.target),
        err
    )]
    pub async fn record_payment(
        &self,
        actor: &Actor,
        payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<LedgerUpdate, LedgerError> {
        let subject = self.subject(payment.target).await?;
        let resource = Resource::assigned(
            ResourceKind::Payment,
            subject.organization_id,
            subject.assignees,
        );
        Self::check(actor, &resource, Action::Create)?;

        let update = self
            .store
            .record_payment(subject.organization_id, payment, actor.account_id, now)
            .await
            .map_err(LedgerError::from)
            .inspect_err(|e| Self::log_failure("record_payment", e))?;

        info!(
            organization_id = %subject.organization_id,
            payment_id = %update.payment.id,
            target = %update.outcome.target,
            amount = update.payment.amount.get(),
            payment_type = update.payment.payment_type.as_str(),
            total_paid = update.outcome.total_paid,
            project_team_paid = ?update.outcome.project_team_paid,
            phase = update.outcome.phase.as_str(),
            "payment recorded"
        );
        Ok(update)
    }

    #[instrument(skip(self, actor), fields(account_id = %actor.account_id), err)]
    pub async fn delete_payment(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
    ) -> Result<LedgerUpdate, LedgerError> {
        let payment = self
            .store
            .payment(payment_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        let subject = self.subject(payment.target).await?;
        let resource = Resource::assigned(
            ResourceKind::Payment,
            payment.organization_id,
            subject.assignees,
        );
        Self::check(actor, &resource, Action::Delete)?;

        let update = self
            .store
            .delete_payment(payment.organization_id, payment_id)
            .await
            .map_err(LedgerError::from)
            .inspect_err(|e| Self::log_failure("delete_payment", e))?;

        info!(
            organization_id = %payment.organization_id,
            payment_id = %payment_id,
            target = %update.outcome.target,
            total_paid = update.outcome.total_paid,
            project_team_paid = ?update.outcome.project_team_paid,
            phase = update.outcome.phase.as_str(),
            "payment deleted"
        );
        Ok(update)
    }

    /// Re-derive a target's totals from its live payments (replay/repair).
    #[instrument(skip(self, actor), fields(account_id = %actor.account_id, target = %target), err)]
    pub async fn recompute(
        &self,
        actor: &Actor,
        target: PaymentTarget,
    ) -> Result<RecomputeOutcome, LedgerError> {
        let subject = self.subject(target).await?;
        let resource = Resource::assigned(
            ResourceKind::Payment,
            subject.organization_id,
            subject.assignees,
        );
        Self::check(actor, &resource, Action::Update)?;

        let outcome = self
            .store
            .recompute(subject.organization_id, target)
            .await
            .map_err(LedgerError::from)
            .inspect_err(|e| Self::log_failure("recompute", e))?;

        info!(
            organization_id = %subject.organization_id,
            target = %target,
            total_paid = outcome.total_paid,
            changed = outcome.changed,
            "totals recomputed"
        );
        Ok(outcome)
    }

    // ─── Read views ─────────────────────────────────────────────────────────

    /// Organization and assignee set of another account's payment history.
    async fn account_resource(
        &self,
        kind: ResourceKind,
        account_id: AccountId,
    ) -> Result<Resource, LedgerError> {
        let membership = self
            .memberships
            .membership_of(account_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        Ok(Resource::assigned(kind, membership.organization_id, [account_id]))
    }

    /// Payment history of `account_id` across its assignments.
    #[instrument(skip(self, actor), fields(actor_id = %actor.account_id), err)]
    pub async fn account_payments(
        &self,
        actor: &Actor,
        account_id: AccountId,
    ) -> Result<Vec<Payment>, LedgerError> {
        let resource = self.account_resource(ResourceKind::Payment, account_id).await?;
        Self::check(actor, &resource, Action::Read)?;
        Ok(self
            .store
            .payments_to(resource.organization_id, account_id)
            .await?)
    }

    /// Allocated, received and pending across the account's active assignments.
    #[instrument(skip(self, actor), fields(actor_id = %actor.account_id), err)]
    pub async fn earnings(
        &self,
        actor: &Actor,
        account_id: AccountId,
    ) -> Result<Earnings, LedgerError> {
        let resource = self
            .account_resource(ResourceKind::Assignment, account_id)
            .await?;
        Self::check(actor, &resource, Action::Read)?;
        let assignments = self
            .store
            .assignments_of(resource.organization_id, account_id)
            .await?;
        Ok(earnings(account_id, &assignments)?)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.account_id), err)]
    pub async fn project_summary(
        &self,
        actor: &Actor,
        project_id: ProjectId,
    ) -> Result<ProjectSummary, LedgerError> {
        let subject = self.subject(PaymentTarget::Project(project_id)).await?;
        let resource = Resource::assigned(
            ResourceKind::Project,
            subject.organization_id,
            subject.assignees,
        );
        Self::check(actor, &resource, Action::Read)?;
        self.store
            .project_summary(subject.organization_id, project_id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    // ─── Record setup ───────────────────────────────────────────────────────

    #[instrument(skip(self, actor, name, now), fields(account_id = %actor.account_id), err)]
    pub async fn create_project(
        &self,
        actor: &Actor,
        client_id: ClientId,
        name: &str,
        budget: i64,
        now: DateTime<Utc>,
    ) -> Result<Project, LedgerError> {
        let org = Self::acting_organization(actor)?;
        Self::check(actor, &Resource::org_wide(ResourceKind::Project, org), Action::Create)?;

        let project = Project::new(org, client_id, name, budget, now)?;
        self.store.insert_project(project.clone()).await?;
        info!(organization_id = %org, project_id = %project.id, budget, "project created");
        Ok(project)
    }

    /// Put a member of the project's organization on the project's team.
    #[instrument(skip(self, actor, req, now), fields(account_id = %actor.account_id, project_id = %req.project_id), err)]
    pub async fn assign(
        &self,
        actor: &Actor,
        req: NewAssignment,
        now: DateTime<Utc>,
    ) -> Result<Assignment, LedgerError> {
        let subject = self.subject(PaymentTarget::Project(req.project_id)).await?;
        let org = subject.organization_id;
        Self::check(actor, &Resource::org_wide(ResourceKind::Assignment, org), Action::Create)?;

        let same_org = self
            .memberships
            .membership_of(req.account_id)
            .await?
            .is_some_and(|m| m.organization_id == org);
        if !same_org {
            return Err(LedgerError::Validation(
                "assignee is not an active member of this organization".to_string(),
            ));
        }

        let project = self
            .store
            .project(org, req.project_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        let assignment =
            Assignment::new(&project, req.account_id, req.role, req.allocated_budget, now)?;
        self.store.insert_assignment(assignment.clone()).await?;
        info!(
            organization_id = %org,
            assignment_id = %assignment.id,
            assignee = %assignment.account_id,
            allocated_budget = ?assignment.allocated_budget,
            "team member assigned"
        );
        Ok(assignment)
    }

    #[instrument(skip(self, actor, description, now), fields(account_id = %actor.account_id), err)]
    pub async fn create_expense(
        &self,
        actor: &Actor,
        description: &str,
        expense_type: ExpenseType,
        total_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Expense, LedgerError> {
        let org = Self::acting_organization(actor)?;
        Self::check(actor, &Resource::org_wide(ResourceKind::Expense, org), Action::Create)?;

        let expense = Expense::new(org, description, expense_type, total_amount, now)?;
        self.store.insert_expense(expense.clone()).await?;
        info!(organization_id = %org, expense_id = %expense.id, "expense created");
        Ok(expense)
    }

    #[instrument(skip(self, actor, title), fields(account_id = %actor.account_id, project_id = %project_id), err)]
    pub async fn create_task(
        &self,
        actor: &Actor,
        project_id: ProjectId,
        title: &str,
        assignee: Option<AccountId>,
    ) -> Result<Task, LedgerError> {
        let subject = self.subject(PaymentTarget::Project(project_id)).await?;
        let org = subject.organization_id;
        Self::check(actor, &Resource::org_wide(ResourceKind::Task, org), Action::Create)?;

        if title.trim().is_empty() {
            return Err(LedgerError::Validation("task title cannot be empty".to_string()));
        }
        let project = self
            .store
            .project(org, project_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        let task = Task::new(&project, title.trim(), assignee);
        self.store.insert_task(task.clone()).await?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agencyledger_auth::{
        Account, AccountKind, Membership, MembershipRole, MembershipStatus, NewTeamMember,
        OwnerSignUp, TenantMembership, provision_owner, provision_team_member,
    };
    use agencyledger_ledger::{PaymentStatus, PaymentType};
    use chrono::NaiveDate;

    use super::*;
    use crate::directory::{Directory, InMemoryDirectory};
    use crate::store::InMemoryLedgerStore;

    type Engine = LedgerEngine<Arc<InMemoryLedgerStore>, Arc<InMemoryDirectory>>;

    struct Agency {
        owner: Actor,
        org: OrganizationId,
    }

    fn actor_of(account: &Account, membership: &Membership) -> Actor {
        Actor::new(
            account,
            Some(TenantMembership {
                organization_id: membership.organization_id,
                role: membership.role.clone(),
            }),
        )
    }

    async fn agency(dir: &InMemoryDirectory, email: &str) -> Agency {
        let p = provision_owner(
            &OwnerSignUp {
                email: email.to_string(),
                display_name: "Owner".to_string(),
                organization_name: "Studio".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        dir.save_owner(&p).await.unwrap();
        Agency {
            owner: actor_of(&p.account, &p.membership),
            org: p.organization.id,
        }
    }

    async fn hire(dir: &InMemoryDirectory, agency: &Agency, email: &str, role: &'static str) -> Actor {
        let (account, membership) = provision_team_member(
            agency.org,
            &NewTeamMember {
                email: email.to_string(),
                display_name: role.to_string(),
                role: MembershipRole::functional(role).unwrap(),
            },
            Utc::now(),
        )
        .unwrap();
        dir.save_team_member(&account, &membership).await.unwrap();
        assert_eq!(account.kind, AccountKind::TeamMember);
        assert_eq!(membership.status, MembershipStatus::Active);
        actor_of(&account, &membership)
    }

    fn engine() -> (Engine, Arc<InMemoryDirectory>) {
        let dir = Arc::new(InMemoryDirectory::new());
        (
            LedgerEngine::new(Arc::new(InMemoryLedgerStore::new()), dir.clone()),
            dir,
        )
    }

    fn pay(target: PaymentTarget, amount: i64, payment_type: PaymentType) -> NewPayment {
        NewPayment {
            target,
            amount,
            payment_type,
            paid_on: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            notes: None,
        }
    }

    async fn staffed_project(engine: &Engine, agency: &Agency, member: &Actor) -> Assignment {
        let project = engine
            .create_project(&agency.owner, ClientId::new(), "Rebrand", 200_000, Utc::now())
            .await
            .unwrap();
        engine
            .assign(
                &agency.owner,
                NewAssignment {
                    project_id: project.id,
                    account_id: member.account_id,
                    role: "designer".to_string(),
                    allocated_budget: Some(50_000),
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn owner_records_and_deletes_with_synchronous_totals() {
        let (engine, dir) = engine();
        let agency = agency(&dir, "owner@studio.io").await;
        let designer = hire(&dir, &agency, "dana@studio.io", "designer").await;
        let a = staffed_project(&engine, &agency, &designer).await;
        let target = PaymentTarget::Assignment(a.id);

        let advance = engine
            .record_payment(&agency.owner, pay(target, 15_000, PaymentType::Advance), Utc::now())
            .await
            .unwrap();
        let last = engine
            .record_payment(&agency.owner, pay(target, 35_000, PaymentType::Final), Utc::now())
            .await
            .unwrap();
        assert_eq!(last.outcome.total_paid, 50_000);
        assert_eq!(last.outcome.payment_status, Some(PaymentStatus::Completed));
        assert_eq!(last.outcome.project_team_paid, Some(50_000));

        let over = engine
            .record_payment(&agency.owner, pay(target, 1, PaymentType::Regular), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(over, LedgerError::Validation(_)));

        let after = engine
            .delete_payment(&agency.owner, advance.payment.id)
            .await
            .unwrap();
        assert_eq!(after.outcome.total_paid, 35_000);
        assert_eq!(after.outcome.payment_status, Some(PaymentStatus::Partial));
    }

    #[tokio::test]
    async fn functional_roles_cannot_write_payments() {
        let (engine, dir) = engine();
        let agency = agency(&dir, "owner@studio.io").await;
        let designer = hire(&dir, &agency, "dana@studio.io", "designer").await;
        let a = staffed_project(&engine, &agency, &designer).await;

        let err = engine
            .record_payment(
                &designer,
                pay(PaymentTarget::Assignment(a.id), 1_000, PaymentType::Regular),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Denied(r) if r.kind == DenyKind::ReadOnlyRole));
        assert!(engine.account_payments(&agency.owner, designer.account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_organizations_are_denied_and_nothing_is_written() {
        let (engine, dir) = engine();
        let ours = agency(&dir, "owner@studio.io").await;
        let theirs = agency(&dir, "owner@rival.io").await;
        let designer = hire(&dir, &ours, "dana@studio.io", "designer").await;
        let a = staffed_project(&engine, &ours, &designer).await;
        let target = PaymentTarget::Assignment(a.id);

        let err = engine
            .record_payment(&theirs.owner, pay(target, 1_000, PaymentType::Regular), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Denied(r) if r.kind == DenyKind::CrossTenant));

        let outcome = engine.recompute(&ours.owner, target).await.unwrap();
        assert_eq!(outcome.total_paid, 0);
        assert!(!outcome.changed);
        assert_ne!(ours.org, theirs.org);
    }

    #[tokio::test]
    async fn designer_cannot_read_a_colleagues_payment_history() {
        let (engine, dir) = engine();
        let agency = agency(&dir, "owner@studio.io").await;
        let dana = hire(&dir, &agency, "dana@studio.io", "designer").await;
        let dev = hire(&dir, &agency, "devi@studio.io", "developer").await;
        let a = staffed_project(&engine, &agency, &dev).await;
        engine
            .record_payment(
                &agency.owner,
                pay(PaymentTarget::Assignment(a.id), 5_000, PaymentType::Regular),
                Utc::now(),
            )
            .await
            .unwrap();

        let err = engine.account_payments(&dana, dev.account_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Denied(r) if r.kind == DenyKind::NotAssigned));

        let own = engine.account_payments(&dev, dev.account_id).await.unwrap();
        assert_eq!(own.len(), 1);
        let mine = engine.earnings(&dev, dev.account_id).await.unwrap();
        assert_eq!((mine.allocated, mine.received, mine.pending), (50_000, 5_000, 45_000));
    }

    #[tokio::test]
    async fn assignees_must_belong_to_the_project_organization() {
        let (engine, dir) = engine();
        let ours = agency(&dir, "owner@studio.io").await;
        let theirs = agency(&dir, "owner@rival.io").await;
        let outsider = hire(&dir, &theirs, "x@rival.io", "designer").await;
        let project = engine
            .create_project(&ours.owner, ClientId::new(), "Site", 10_000, Utc::now())
            .await
            .unwrap();

        let err = engine
            .assign(
                &ours.owner,
                NewAssignment {
                    project_id: project.id,
                    account_id: outsider.account_id,
                    role: "designer".to_string(),
                    allocated_budget: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn actors_without_membership_cannot_create_records() {
        let (engine, _dir) = engine();
        let loose = Actor {
            account_id: AccountId::new(),
            kind: AccountKind::TeamMember,
            membership: None,
        };
        let err = engine
            .create_expense(&loose, "Fonts", ExpenseType::Other, 4_900, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::NoMembership);
    }

    #[tokio::test]
    async fn summary_reflects_team_and_tasks() {
        let (engine, dir) = engine();
        let agency = agency(&dir, "owner@studio.io").await;
        let dana = hire(&dir, &agency, "dana@studio.io", "designer").await;
        let a = staffed_project(&engine, &agency, &dana).await;
        engine
            .create_task(&agency.owner, a.project_id, "Moodboard", Some(dana.account_id))
            .await
            .unwrap();
        engine
            .record_payment(
                &agency.owner,
                pay(PaymentTarget::Project(a.project_id), 80_000, PaymentType::Milestone),
                Utc::now(),
            )
            .await
            .unwrap();

        let summary = engine.project_summary(&dana, a.project_id).await.unwrap();
        assert_eq!(summary.team_count, 1);
        assert_eq!(summary.task_count, 1);
        assert_eq!(summary.total_paid, 80_000);
        assert_eq!(summary.pending, 120_000);
    }
}
