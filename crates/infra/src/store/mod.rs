//! Ledger persistence.
//!
//! Every mutation runs as one unit: lock the target (and, for assignments,
//! its project, in that order), validate, write the payment, re-sum, commit.
//! Nothing outside the store ever reads a total, adds to it, and writes it
//! back.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use agencyledger_core::{AccountId, DomainError, OrganizationId, PaymentId, ProjectId};
use agencyledger_ledger::{
    Assignment, Expense, LedgerUpdate, NewPayment, Payment, PaymentTarget, Project, ProjectSummary,
    RecomputeOutcome, Task,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Deterministic domain failure (validation, not found, consistency).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A record was addressed through an organization it does not belong to.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// The backing storage failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Who a payment target belongs to: what the policy evaluator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub organization_id: OrganizationId,
    pub assignees: Vec<AccountId>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ─── Authorization subjects (unscoped, read-only) ───────────────────────

    async fn subject(&self, target: PaymentTarget) -> Result<Option<Subject>, StoreError>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    // ─── Ledger mutations (organization-scoped, atomic) ─────────────────────

    async fn record_payment(
        &self,
        organization_id: OrganizationId,
        payment: NewPayment,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> Result<LedgerUpdate, StoreError>;

    async fn delete_payment(
        &self,
        organization_id: OrganizationId,
        payment_id: PaymentId,
    ) -> Result<LedgerUpdate, StoreError>;

    async fn recompute(
        &self,
        organization_id: OrganizationId,
        target: PaymentTarget,
    ) -> Result<RecomputeOutcome, StoreError>;

    // ─── Read views ─────────────────────────────────────────────────────────

    async fn project(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<Project>, StoreError>;

    async fn assignments_of(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Assignment>, StoreError>;

    async fn payments_to(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn project_summary(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<ProjectSummary>, StoreError>;

    // ─── Record setup ───────────────────────────────────────────────────────

    async fn insert_project(&self, project: Project) -> Result<(), StoreError>;

    async fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError>;

    async fn insert_expense(&self, expense: Expense) -> Result<(), StoreError>;

    async fn insert_task(&self, task: Task) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn subject(&self, target: PaymentTarget) -> Result<Option<Subject>, StoreError> {
        (**self).subject(target).await
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        (**self).payment(id).await
    }

    async fn record_payment(
        &self,
        organization_id: OrganizationId,
        payment: NewPayment,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> Result<LedgerUpdate, StoreError> {
        (**self).record_payment(organization_id, payment, created_by, now).await
    }

    async fn delete_payment(
        &self,
        organization_id: OrganizationId,
        payment_id: PaymentId,
    ) -> Result<LedgerUpdate, StoreError> {
        (**self).delete_payment(organization_id, payment_id).await
    }

    async fn recompute(
        &self,
        organization_id: OrganizationId,
        target: PaymentTarget,
    ) -> Result<RecomputeOutcome, StoreError> {
        (**self).recompute(organization_id, target).await
    }

    async fn project(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<Project>, StoreError> {
        (**self).project(organization_id, id).await
    }

    async fn assignments_of(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Assignment>, StoreError> {
        (**self).assignments_of(organization_id, account_id).await
    }

    async fn payments_to(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Payment>, StoreError> {
        (**self).payments_to(organization_id, account_id).await
    }

    async fn project_summary(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<ProjectSummary>, StoreError> {
        (**self).project_summary(organization_id, id).await
    }

    async fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        (**self).insert_project(project).await
    }

    async fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        (**self).insert_assignment(assignment).await
    }

    async fn insert_expense(&self, expense: Expense) -> Result<(), StoreError> {
        (**self).insert_expense(expense).await
    }

    async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        (**self).insert_task(task).await
    }
}
