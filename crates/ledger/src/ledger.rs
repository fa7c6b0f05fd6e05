//! Aggregate maintenance for the three ledger levels.
//!
//! [`TargetLedger`] is the validation snapshot both stores build under their
//! row lock. [`OrganizationLedger`] is a complete, pure book for one
//! organization: every mutation is planned first and applied only once every
//! derived total has been recomputed successfully, so a failed call leaves the
//! book exactly as it was.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agencyledger_core::{
    AccountId, Amount, AssignmentId, DomainError, DomainResult, ExpenseId, OrganizationId,
    PaymentId, ProjectId, TaskId, TenantOwned,
};

use crate::payment::{NewPayment, Payment, PaymentTarget, PaymentType};
use crate::phase::PaymentPhase;
use crate::records::{Assignment, AssignmentStatus, Expense, Project, Task};
use crate::totals::{PaymentStatus, recompute_total};

/// The parts of a live payment the ledger math needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePayment {
    pub id: PaymentId,
    pub amount: i64,
    pub payment_type: PaymentType,
}

impl From<&Payment> for LivePayment {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id,
            amount: p.amount.get(),
            payment_type: p.payment_type,
        }
    }
}

/// Everything needed to validate a mutation against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLedger {
    pub target: PaymentTarget,
    pub organization_id: OrganizationId,
    /// Allocation ceiling; only team assignments have one.
    pub ceiling: Option<i64>,
    pub accepts_payments: bool,
    pub live: Vec<LivePayment>,
}

impl TargetLedger {
    pub fn total(&self) -> DomainResult<i64> {
        recompute_total(self.live.iter().map(|p| p.amount))
    }

    /// Validate a new payment and return the target total after inserting it.
    ///
    /// Checks, in order: the target takes payments, the allocation ceiling.
    /// The payment type never blocks a payment; it only feeds the reported
    /// phase.
    pub fn check_record(&self, amount: Amount) -> DomainResult<i64> {
        if !self.accepts_payments {
            return Err(DomainError::validation(format!(
                "{} does not accept payment records",
                self.target
            )));
        }

        let existing = self.total()?;
        let next = recompute_total([existing, amount.get()])?;

        if let Some(ceiling) = self.ceiling {
            if next > ceiling {
                return Err(DomainError::validation(format!(
                    "payment of {amount} exceeds the remaining allocation of {}",
                    (ceiling - existing).max(0)
                )));
            }
        }

        Ok(next)
    }

    /// Total after removing `payment_id`.
    pub fn check_delete(&self, payment_id: PaymentId) -> DomainResult<i64> {
        if !self.live.iter().any(|p| p.id == payment_id) {
            return Err(DomainError::not_found());
        }
        recompute_total(
            self.live
                .iter()
                .filter(|p| p.id != payment_id)
                .map(|p| p.amount),
        )
    }
}

/// Derived state of a target after a mutation or an explicit recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeOutcome {
    pub target: PaymentTarget,
    pub total_paid: i64,
    pub payment_status: Option<PaymentStatus>,
    pub phase: PaymentPhase,
    /// Re-summed `team_paid` of the parent project, for assignment targets.
    pub project_team_paid: Option<i64>,
    /// Whether any stored value differed from the recomputed one.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerUpdate {
    pub payment: Payment,
    pub outcome: RecomputeOutcome,
}

#[derive(Debug, Clone, Copy)]
struct Plan {
    target: PaymentTarget,
    total: i64,
    project_team_paid: Option<(ProjectId, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationLedger {
    organization_id: OrganizationId,
    projects: BTreeMap<ProjectId, Project>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    expenses: BTreeMap<ExpenseId, Expense>,
    tasks: BTreeMap<TaskId, Task>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl OrganizationLedger {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            projects: BTreeMap::new(),
            assignments: BTreeMap::new(),
            expenses: BTreeMap::new(),
            tasks: BTreeMap::new(),
            payments: BTreeMap::new(),
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn ensure_tenant(&self, record: &impl TenantOwned) -> DomainResult<()> {
        if record.organization_id() != self.organization_id {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    // ─── Records ────────────────────────────────────────────────────────────

    pub fn add_project(&mut self, project: Project) -> DomainResult<()> {
        self.ensure_tenant(&project)?;
        if self.projects.contains_key(&project.id) {
            return Err(DomainError::conflict("project already exists"));
        }
        self.projects.insert(project.id, project);
        Ok(())
    }

    pub fn add_assignment(&mut self, assignment: Assignment) -> DomainResult<()> {
        self.ensure_tenant(&assignment)?;
        if !self.projects.contains_key(&assignment.project_id) {
            return Err(DomainError::not_found());
        }
        if self.assignments.contains_key(&assignment.id) {
            return Err(DomainError::conflict("assignment already exists"));
        }
        self.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    pub fn add_expense(&mut self, expense: Expense) -> DomainResult<()> {
        self.ensure_tenant(&expense)?;
        if self.expenses.contains_key(&expense.id) {
            return Err(DomainError::conflict("expense already exists"));
        }
        self.expenses.insert(expense.id, expense);
        Ok(())
    }

    pub fn add_task(&mut self, task: Task) -> DomainResult<()> {
        self.ensure_tenant(&task)?;
        if !self.projects.contains_key(&task.project_id) {
            return Err(DomainError::not_found());
        }
        self.tasks.insert(task.id, task);
        Ok(())
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn assignment(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.get(&id)
    }

    pub fn expense(&self, id: ExpenseId) -> Option<&Expense> {
        self.expenses.get(&id)
    }

    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn payments_for(&self, target: PaymentTarget) -> impl Iterator<Item = &Payment> {
        self.payments.values().filter(move |p| p.target == target)
    }

    /// Payments on any of `account_id`'s assignments, oldest first.
    pub fn payments_to(&self, account_id: AccountId) -> Vec<&Payment> {
        self.payments
            .values()
            .filter(|p| match p.target {
                PaymentTarget::Assignment(id) => self
                    .assignments
                    .get(&id)
                    .is_some_and(|a| a.account_id == account_id),
                _ => false,
            })
            .collect()
    }

    /// Accounts a payment's target is assigned to (empty for org-wide targets).
    pub fn assignees_of(&self, target: PaymentTarget) -> Vec<AccountId> {
        match target {
            PaymentTarget::Assignment(id) => {
                self.assignments.get(&id).map(|a| a.account_id).into_iter().collect()
            }
            PaymentTarget::Project(id) => self
                .assignments
                .values()
                .filter(|a| a.project_id == id && a.status != AssignmentStatus::Removed)
                .map(|a| a.account_id)
                .collect(),
            PaymentTarget::Expense(_) => Vec::new(),
        }
    }

    pub fn target_ledger(&self, target: PaymentTarget) -> DomainResult<TargetLedger> {
        let (ceiling, accepts_payments) = match target {
            PaymentTarget::Project(id) => {
                self.projects.get(&id).ok_or(DomainError::NotFound)?;
                (None, true)
            }
            PaymentTarget::Assignment(id) => {
                let a = self.assignments.get(&id).ok_or(DomainError::NotFound)?;
                (a.allocated_budget, true)
            }
            PaymentTarget::Expense(id) => {
                let e = self.expenses.get(&id).ok_or(DomainError::NotFound)?;
                (None, e.accepts_payments())
            }
        };

        Ok(TargetLedger {
            target,
            organization_id: self.organization_id,
            ceiling,
            accepts_payments,
            live: self.payments_for(target).map(LivePayment::from).collect(),
        })
    }

    // ─── Mutations ──────────────────────────────────────────────────────────

    /// Validate, insert and recompute. Nothing changes on error.
    pub fn record_payment(
        &mut self,
        new: NewPayment,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> DomainResult<LedgerUpdate> {
        let snapshot = self.target_ledger(new.target)?;
        snapshot.check_record(new.validated_amount()?)?;

        let payment = new.into_payment(self.organization_id, created_by, now)?;
        let amounts = snapshot
            .live
            .iter()
            .map(|p| p.amount)
            .chain([payment.amount.get()]);
        let plan = self.plan(payment.target, amounts)?;

        self.payments.insert(payment.id, payment.clone());
        let changed = self.apply(plan);
        let outcome = self.outcome(payment.target, changed)?;
        Ok(LedgerUpdate { payment, outcome })
    }

    /// Remove a payment and recompute its target. Nothing changes on error.
    pub fn delete_payment(&mut self, payment_id: PaymentId) -> DomainResult<LedgerUpdate> {
        let payment = self
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or(DomainError::NotFound)?;

        let snapshot = self.target_ledger(payment.target)?;
        snapshot.check_delete(payment_id)?;
        let amounts = snapshot
            .live
            .iter()
            .filter(|p| p.id != payment_id)
            .map(|p| p.amount);
        let plan = self.plan(payment.target, amounts)?;

        self.payments.remove(&payment_id);
        let changed = self.apply(plan);
        let outcome = self.outcome(payment.target, changed)?;
        Ok(LedgerUpdate { payment, outcome })
    }

    /// Re-derive a target's totals from its live payments. Writes only what
    /// differs; calling it twice in a row reports `changed = false` the
    /// second time.
    pub fn recompute(&mut self, target: PaymentTarget) -> DomainResult<RecomputeOutcome> {
        let snapshot = self.target_ledger(target)?;
        let plan = self.plan(target, snapshot.live.iter().map(|p| p.amount))?;
        let changed = self.apply(plan);
        self.outcome(target, changed)
    }

    /// Every stored derived total equals the re-sum of its live payments.
    pub fn verify(&self) -> DomainResult<()> {
        let mismatch = |what: String| Err(DomainError::consistency(what));

        for p in self.projects.values() {
            let paid = recompute_total(
                self.payments_for(PaymentTarget::Project(p.id)).map(|x| x.amount.get()),
            )?;
            if paid != p.total_paid {
                return mismatch(format!("project {} total_paid {} != {paid}", p.id, p.total_paid));
            }
            let team = recompute_total(
                self.assignments
                    .values()
                    .filter(|a| a.project_id == p.id)
                    .map(|a| a.total_paid),
            )?;
            if team != p.team_paid {
                return mismatch(format!("project {} team_paid {} != {team}", p.id, p.team_paid));
            }
        }
        for a in self.assignments.values() {
            let paid = recompute_total(
                self.payments_for(PaymentTarget::Assignment(a.id)).map(|x| x.amount.get()),
            )?;
            if paid != a.total_paid {
                return mismatch(format!("assignment {} total_paid {} != {paid}", a.id, a.total_paid));
            }
        }
        for e in self.expenses.values() {
            let paid = recompute_total(
                self.payments_for(PaymentTarget::Expense(e.id)).map(|x| x.amount.get()),
            )?;
            if paid != e.paid_amount {
                return mismatch(format!("expense {} paid_amount {} != {paid}", e.id, e.paid_amount));
            }
        }
        Ok(())
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn plan(
        &self,
        target: PaymentTarget,
        live_amounts: impl IntoIterator<Item = i64>,
    ) -> DomainResult<Plan> {
        let total = recompute_total(live_amounts)?;

        let project_team_paid = match target {
            PaymentTarget::Assignment(id) => {
                let assignment = self.assignments.get(&id).ok_or(DomainError::NotFound)?;
                let team_paid = recompute_total(
                    self.assignments
                        .values()
                        .filter(|a| a.project_id == assignment.project_id)
                        .map(|a| if a.id == id { total } else { a.total_paid }),
                )?;
                Some((assignment.project_id, team_paid))
            }
            _ => None,
        };

        Ok(Plan {
            target,
            total,
            project_team_paid,
        })
    }

    /// Assignment before project.
    fn apply(&mut self, plan: Plan) -> bool {
        let mut changed = false;
        let mut set = |slot: &mut i64, value: i64| {
            if *slot != value {
                *slot = value;
                changed = true;
            }
        };

        match plan.target {
            PaymentTarget::Project(id) => {
                if let Some(p) = self.projects.get_mut(&id) {
                    set(&mut p.total_paid, plan.total);
                }
            }
            PaymentTarget::Assignment(id) => {
                if let Some(a) = self.assignments.get_mut(&id) {
                    set(&mut a.total_paid, plan.total);
                }
            }
            PaymentTarget::Expense(id) => {
                if let Some(e) = self.expenses.get_mut(&id) {
                    set(&mut e.paid_amount, plan.total);
                }
            }
        }

        if let Some((project_id, team_paid)) = plan.project_team_paid {
            if let Some(p) = self.projects.get_mut(&project_id) {
                set(&mut p.team_paid, team_paid);
            }
        }
        changed
    }

    fn outcome(&self, target: PaymentTarget, changed: bool) -> DomainResult<RecomputeOutcome> {
        let phase = PaymentPhase::derive(self.payments_for(target).map(|p| p.payment_type));
        let (total_paid, payment_status, project_team_paid) = match target {
            PaymentTarget::Project(id) => {
                let p = self.projects.get(&id).ok_or(DomainError::NotFound)?;
                (p.total_paid, None, None)
            }
            PaymentTarget::Assignment(id) => {
                let a = self.assignments.get(&id).ok_or(DomainError::NotFound)?;
                let team_paid = self.projects.get(&a.project_id).map(|p| p.team_paid);
                (a.total_paid, Some(a.payment_status()), team_paid)
            }
            PaymentTarget::Expense(id) => {
                let e = self.expenses.get(&id).ok_or(DomainError::NotFound)?;
                (e.paid_amount, e.payment_status(), None)
            }
        };

        Ok(RecomputeOutcome {
            target,
            total_paid,
            payment_status,
            phase,
            project_team_paid,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ExpenseType;
    use agencyledger_core::ClientId;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    struct Fixture {
        ledger: OrganizationLedger,
        project: ProjectId,
        assignment: AssignmentId,
        unbounded: AssignmentId,
        expense: ExpenseId,
        other_expense: ExpenseId,
    }

    fn fixture() -> Fixture {
        let org = OrganizationId::new();
        let now = Utc::now();
        let mut ledger = OrganizationLedger::new(org);

        let project = Project::new(org, ClientId::new(), "Rebrand", 200_000, now).unwrap();
        let assignment = Assignment::new(&project, AccountId::new(), "designer", Some(50_000), now).unwrap();
        let unbounded = Assignment::new(&project, AccountId::new(), "developer", None, now).unwrap();
        let expense = Expense::new(org, "Contractors", ExpenseType::Team, 30_000, now).unwrap();
        let other = Expense::new(org, "Fonts", ExpenseType::Other, 900, now).unwrap();

        let ids = (project.id, assignment.id, unbounded.id, expense.id, other.id);
        ledger.add_project(project).unwrap();
        ledger.add_assignment(assignment).unwrap();
        ledger.add_assignment(unbounded).unwrap();
        ledger.add_expense(expense).unwrap();
        ledger.add_expense(other).unwrap();

        Fixture {
            ledger,
            project: ids.0,
            assignment: ids.1,
            unbounded: ids.2,
            expense: ids.3,
            other_expense: ids.4,
        }
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

    fn record(f: &mut Fixture, target: PaymentTarget, amount: i64, t: PaymentType) -> DomainResult<LedgerUpdate> {
        f.ledger.record_payment(pay(target, amount, t), AccountId::new(), Utc::now())
    }

    #[test]
    fn advance_then_final_completes_the_allocation() {
        let mut f = fixture();
        let target = PaymentTarget::Assignment(f.assignment);

        record(&mut f, target, 15_000, PaymentType::Advance).unwrap();
        let update = record(&mut f, target, 35_000, PaymentType::Final).unwrap();

        assert_eq!(update.outcome.total_paid, 50_000);
        assert_eq!(update.outcome.payment_status, Some(PaymentStatus::Completed));
        assert_eq!(update.outcome.phase, PaymentPhase::Settled);
        assert_eq!(update.outcome.project_team_paid, Some(50_000));
        f.ledger.verify().unwrap();
    }

    #[test]
    fn over_allocation_is_rejected_without_mutation() {
        let mut f = fixture();
        let target = PaymentTarget::Assignment(f.assignment);
        record(&mut f, target, 15_000, PaymentType::Advance).unwrap();
        record(&mut f, target, 35_000, PaymentType::Final).unwrap();
        let before = f.ledger.clone();

        let err = record(&mut f, target, 1, PaymentType::Regular).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(f.ledger, before);
        assert_eq!(f.ledger.assignment(f.assignment).unwrap().total_paid, 50_000);
    }

    #[test]
    fn deleting_the_advance_reopens_the_allocation() {
        let mut f = fixture();
        let target = PaymentTarget::Assignment(f.assignment);
        let advance = record(&mut f, target, 15_000, PaymentType::Advance).unwrap().payment;
        record(&mut f, target, 35_000, PaymentType::Final).unwrap();

        let update = f.ledger.delete_payment(advance.id).unwrap();

        assert_eq!(update.outcome.total_paid, 35_000);
        assert_eq!(update.outcome.payment_status, Some(PaymentStatus::Partial));
        assert_eq!(f.ledger.project(f.project).unwrap().team_paid, 35_000);
        f.ledger.verify().unwrap();
    }

    #[test]
    fn project_payments_do_not_touch_team_paid() {
        let mut f = fixture();
        let target = PaymentTarget::Project(f.project);
        let update = record(&mut f, target, 80_000, PaymentType::Milestone).unwrap();

        let project = f.ledger.project(f.project).unwrap();
        assert_eq!(update.outcome.total_paid, 80_000);
        assert_eq!(project.team_paid, 0);
        assert_eq!(project.pending(), 120_000);
    }

    #[test]
    fn expense_status_tracks_paid_amount() {
        let mut f = fixture();
        let target = PaymentTarget::Expense(f.expense);
        let first = record(&mut f, target, 10_000, PaymentType::Regular).unwrap();
        assert_eq!(first.outcome.payment_status, Some(PaymentStatus::Partial));

        let second = record(&mut f, target, 20_000, PaymentType::Regular).unwrap();
        assert_eq!(second.outcome.payment_status, Some(PaymentStatus::Completed));

        let back = f.ledger.delete_payment(second.payment.id).unwrap();
        assert_eq!(back.outcome.payment_status, Some(PaymentStatus::Partial));
    }

    #[test]
    fn other_expenses_take_no_payments() {
        let mut f = fixture();
        let target = PaymentTarget::Expense(f.other_expense);
        let err = record(&mut f, target, 100, PaymentType::Regular).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unknown_targets_and_payments_are_not_found() {
        let mut f = fixture();
        let ghost = PaymentTarget::Project(ProjectId::new());
        assert_eq!(record(&mut f, ghost, 1, PaymentType::Regular).unwrap_err(), DomainError::NotFound);
        assert_eq!(f.ledger.delete_payment(PaymentId::new()).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn remaining_allocation_is_payable_after_the_advance_is_deleted() {
        let mut f = fixture();
        let target = PaymentTarget::Assignment(f.assignment);
        let advance = record(&mut f, target, 15_000, PaymentType::Advance).unwrap().payment;
        record(&mut f, target, 35_000, PaymentType::Final).unwrap();
        f.ledger.delete_payment(advance.id).unwrap();

        let update = record(&mut f, target, 15_000, PaymentType::Regular).unwrap();

        assert_eq!(update.outcome.total_paid, 50_000);
        assert_eq!(update.outcome.payment_status, Some(PaymentStatus::Completed));
        assert_eq!(update.outcome.phase, PaymentPhase::Settled);
        assert_eq!(f.ledger.project(f.project).unwrap().team_paid, 50_000);
        f.ledger.verify().unwrap();
    }

    #[test]
    fn payment_type_order_never_blocks_a_payment() {
        let mut f = fixture();
        let target = PaymentTarget::Project(f.project);
        record(&mut f, target, 10_000, PaymentType::Milestone).unwrap();

        let update = record(&mut f, target, 5_000, PaymentType::Advance).unwrap();
        assert_eq!(update.outcome.total_paid, 15_000);
        assert_eq!(update.outcome.phase, PaymentPhase::InProgress);

        record(&mut f, target, 5_000, PaymentType::Final).unwrap();
        let after_final = record(&mut f, target, 1_000, PaymentType::Advance).unwrap();
        assert_eq!(after_final.outcome.total_paid, 21_000);
        assert_eq!(after_final.outcome.phase, PaymentPhase::Settled);
    }

    #[test]
    fn recompute_repairs_drift_and_is_idempotent() {
        let mut f = fixture();
        let target = PaymentTarget::Assignment(f.assignment);
        record(&mut f, target, 20_000, PaymentType::Regular).unwrap();

        // Simulate a drifted aggregate.
        f.ledger.assignments.get_mut(&f.assignment).unwrap().total_paid = 7;

        let first = f.ledger.recompute(target).unwrap();
        assert!(first.changed);
        assert_eq!(first.total_paid, 20_000);

        let second = f.ledger.recompute(target).unwrap();
        assert!(!second.changed);
        assert_eq!(second, RecomputeOutcome { changed: false, ..first });
    }

    #[test]
    fn records_from_another_tenant_are_refused() {
        let mut f = fixture();
        let foreign = Project::new(OrganizationId::new(), ClientId::new(), "X", 0, Utc::now()).unwrap();
        assert!(matches!(f.ledger.add_project(foreign), Err(DomainError::InvariantViolation(_))));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Pay { target: usize, amount: i64, kind: PaymentType },
        Delete { pick: usize },
    }

    fn any_type() -> impl Strategy<Value = PaymentType> {
        prop_oneof![
            Just(PaymentType::Advance),
            Just(PaymentType::Milestone),
            Just(PaymentType::Regular),
            Just(PaymentType::Final),
        ]
    }

    fn any_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0usize..4, -5i64..30_000, any_type())
                .prop_map(|(target, amount, kind)| Op::Pay { target, amount, kind }),
            1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: after any interleaving of inserts and deletes, every
        /// derived total equals the sum of live payments, no allocation is
        /// exceeded, and failed operations change nothing.
        #[test]
        fn ledger_invariants_hold_under_interleavings(ops in prop::collection::vec(any_op(), 1..40)) {
            let mut f = fixture();
            let targets = [
                PaymentTarget::Assignment(f.assignment),
                PaymentTarget::Assignment(f.unbounded),
                PaymentTarget::Project(f.project),
                PaymentTarget::Expense(f.expense),
            ];
            let mut live: Vec<PaymentId> = Vec::new();

            for op in ops {
                let before = f.ledger.clone();
                let result = match op {
                    Op::Pay { target, amount, kind } => {
                        record(&mut f, targets[target], amount, kind).map(|u| live.push(u.payment.id))
                    }
                    Op::Delete { pick } if !live.is_empty() => {
                        let id = live.remove(pick % live.len());
                        f.ledger.delete_payment(id).map(|_| ())
                    }
                    Op::Delete { .. } => Ok(()),
                };
                if result.is_err() {
                    prop_assert_eq!(&f.ledger, &before);
                }

                prop_assert!(f.ledger.verify().is_ok());
                let a = f.ledger.assignment(f.assignment).unwrap();
                prop_assert!(a.total_paid <= a.allocated_budget.unwrap());
            }
        }

        /// Property: recompute on a consistent book never changes anything.
        #[test]
        fn recompute_is_idempotent(amounts in prop::collection::vec(1i64..10_000, 0..10)) {
            let mut f = fixture();
            let target = PaymentTarget::Assignment(f.unbounded);
            for amount in amounts {
                record(&mut f, target, amount, PaymentType::Regular).unwrap();
            }
            let before = f.ledger.clone();
            let outcome = f.ledger.recompute(target).unwrap();
            prop_assert!(!outcome.changed);
            prop_assert_eq!(&f.ledger, &before);
        }
    }
}
