use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use agencyledger_core::{AccountId, OrganizationId, PaymentId, ProjectId};
use agencyledger_ledger::{
    Assignment, Expense, LedgerUpdate, NewPayment, OrganizationLedger, Payment, PaymentTarget,
    Project, ProjectSummary, RecomputeOutcome, Task, project_summary,
};

use super::{LedgerStore, StoreError, Subject};

type Book = Arc<Mutex<OrganizationLedger>>;

/// In-memory ledger store for tests/dev.
///
/// One async mutex per organization: writers to the same organization are
/// serialized for the whole validate → insert → recompute sequence, while
/// different organizations never wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    books: RwLock<HashMap<OrganizationId, Book>>,
    /// Project/assignment/expense id → owning organization.
    targets: RwLock<HashMap<Uuid, OrganizationId>>,
    payments: RwLock<HashMap<PaymentId, OrganizationId>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, organization_id: OrganizationId) -> Result<Book, StoreError> {
        if let Some(book) = self.books.read().map_err(poisoned)?.get(&organization_id) {
            return Ok(book.clone());
        }
        let mut books = self.books.write().map_err(poisoned)?;
        Ok(books
            .entry(organization_id)
            .or_insert_with(|| Arc::new(Mutex::new(OrganizationLedger::new(organization_id))))
            .clone())
    }

    fn owner_of_target(&self, id: Uuid) -> Result<Option<OrganizationId>, StoreError> {
        Ok(self.targets.read().map_err(poisoned)?.get(&id).copied())
    }

    fn owner_of_payment(&self, id: PaymentId) -> Result<Option<OrganizationId>, StoreError> {
        Ok(self.payments.read().map_err(poisoned)?.get(&id).copied())
    }

    fn index_target(&self, id: Uuid, organization_id: OrganizationId) -> Result<(), StoreError> {
        self.targets.write().map_err(poisoned)?.insert(id, organization_id);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn subject(&self, target: PaymentTarget) -> Result<Option<Subject>, StoreError> {
        let Some(organization_id) = self.owner_of_target(target.id())? else {
            return Ok(None);
        };
        let book = self.book(organization_id)?;
        let ledger = book.lock().await;
        if ledger.target_ledger(target).is_err() {
            return Ok(None);
        }
        Ok(Some(Subject {
            organization_id,
            assignees: ledger.assignees_of(target),
        }))
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let Some(organization_id) = self.owner_of_payment(id)? else {
            return Ok(None);
        };
        let book = self.book(organization_id)?;
        let ledger = book.lock().await;
        Ok(ledger.payment(id).cloned())
    }

    async fn record_payment(
        &self,
        organization_id: OrganizationId,
        payment: NewPayment,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> Result<LedgerUpdate, StoreError> {
        let book = self.book(organization_id)?;
        let mut ledger = book.lock().await;
        let update = ledger.record_payment(payment, created_by, now)?;
        self.payments
            .write()
            .map_err(poisoned)?
            .insert(update.payment.id, organization_id);
        Ok(update)
    }

    async fn delete_payment(
        &self,
        organization_id: OrganizationId,
        payment_id: PaymentId,
    ) -> Result<LedgerUpdate, StoreError> {
        let book = self.book(organization_id)?;
        let mut ledger = book.lock().await;
        let update = ledger.delete_payment(payment_id)?;
        self.payments.write().map_err(poisoned)?.remove(&payment_id);
        Ok(update)
    }

    async fn recompute(
        &self,
        organization_id: OrganizationId,
        target: PaymentTarget,
    ) -> Result<RecomputeOutcome, StoreError> {
        let book = self.book(organization_id)?;
        let mut ledger = book.lock().await;
        Ok(ledger.recompute(target)?)
    }

    async fn project(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<Project>, StoreError> {
        let book = self.book(organization_id)?;
        let ledger = book.lock().await;
        Ok(ledger.project(id).cloned())
    }

    async fn assignments_of(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Assignment>, StoreError> {
        let book = self.book(organization_id)?;
        let ledger = book.lock().await;
        Ok(ledger
            .assignments()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn payments_to(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Payment>, StoreError> {
        let book = self.book(organization_id)?;
        let ledger = book.lock().await;
        Ok(ledger.payments_to(account_id).into_iter().cloned().collect())
    }

    async fn project_summary(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<ProjectSummary>, StoreError> {
        let book = self.book(organization_id)?;
        let ledger = book.lock().await;
        Ok(ledger
            .project(id)
            .map(|p| project_summary(p, ledger.assignments(), ledger.tasks())))
    }

    async fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        let (id, organization_id) = (*project.id.as_uuid(), project.organization_id);
        let book = self.book(organization_id)?;
        book.lock().await.add_project(project)?;
        self.index_target(id, organization_id)
    }

    async fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        let (id, organization_id) = (*assignment.id.as_uuid(), assignment.organization_id);
        let book = self.book(organization_id)?;
        book.lock().await.add_assignment(assignment)?;
        self.index_target(id, organization_id)
    }

    async fn insert_expense(&self, expense: Expense) -> Result<(), StoreError> {
        let (id, organization_id) = (*expense.id.as_uuid(), expense.organization_id);
        let book = self.book(organization_id)?;
        book.lock().await.add_expense(expense)?;
        self.index_target(id, organization_id)
    }

    async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        let book = self.book(task.organization_id)?;
        book.lock().await.add_task(task)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencyledger_core::{ClientId, DomainError};
    use agencyledger_ledger::{PaymentStatus, PaymentType};
    use chrono::NaiveDate;

    async fn seeded(allocated: Option<i64>) -> (Arc<InMemoryLedgerStore>, OrganizationId, Assignment) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let org = OrganizationId::new();
        let project = Project::new(org, ClientId::new(), "Launch", 100_000, Utc::now()).unwrap();
        let assignment = Assignment::new(&project, AccountId::new(), "designer", allocated, Utc::now()).unwrap();
        store.insert_project(project).await.unwrap();
        store.insert_assignment(assignment.clone()).await.unwrap();
        (store, org, assignment)
    }

    fn pay(target: PaymentTarget, amount: i64) -> NewPayment {
        NewPayment {
            target,
            amount,
            payment_type: PaymentType::Regular,
            paid_on: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            notes: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_payments_never_exceed_the_allocation() {
        let (store, org, assignment) = seeded(Some(20_000)).await;
        let target = PaymentTarget::Assignment(assignment.id);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.record_payment(org, pay(target, 1_000), AccountId::new(), Utc::now()).await
                })
            })
            .collect();

        let mut accepted = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 20);
        let outcome = store.recompute(org, target).await.unwrap();
        assert_eq!(outcome.total_paid, 20_000);
        assert!(!outcome.changed);
        assert_eq!(outcome.payment_status, Some(PaymentStatus::Completed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_and_deletes_leave_exact_sum() {
        let (store, org, assignment) = seeded(None).await;
        let target = PaymentTarget::Assignment(assignment.id);

        let mut ids = Vec::new();
        for _ in 0..20 {
            let update = store.record_payment(org, pay(target, 500), AccountId::new(), Utc::now()).await.unwrap();
            ids.push(update.payment.id);
        }

        let mut handles = Vec::new();
        for id in ids.into_iter().take(10) {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.delete_payment(org, id).await.map(|_| ()) }));
        }
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_payment(org, pay(target, 250), AccountId::new(), Utc::now()).await.map(|_| ())
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let project = store.project(org, assignment.project_id).await.unwrap().unwrap();
        assert_eq!(project.team_paid, 10 * 500 + 10 * 250);
        assert!(!store.recompute(org, target).await.unwrap().changed);
    }

    #[tokio::test]
    async fn targets_are_invisible_from_another_organization() {
        let (store, _org, assignment) = seeded(None).await;
        let target = PaymentTarget::Assignment(assignment.id);

        let err = store
            .record_payment(OrganizationId::new(), pay(target, 100), AccountId::new(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Domain(DomainError::NotFound));
    }

    #[tokio::test]
    async fn subject_names_the_owning_organization_and_assignee() {
        let (store, org, assignment) = seeded(None).await;
        let subject = store
            .subject(PaymentTarget::Assignment(assignment.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subject.organization_id, org);
        assert_eq!(subject.assignees, vec![assignment.account_id]);

        assert!(store
            .subject(PaymentTarget::Expense(agencyledger_core::ExpenseId::new()))
            .await
            .unwrap()
            .is_none());
    }
}
