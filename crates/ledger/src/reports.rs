//! Read views over ledger records.

use serde::Serialize;

use agencyledger_core::{AccountId, DomainResult, ProjectId};

use crate::records::{Assignment, AssignmentStatus, Project, Task};
use crate::totals::recompute_total;

/// What one account has been allocated and paid across its active assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Earnings {
    pub account_id: AccountId,
    pub active_assignments: usize,
    pub allocated: i64,
    pub received: i64,
    /// Σ `max(allocated - paid, 0)` per assignment, so an unconstrained or
    /// overpaid assignment never offsets another's shortfall.
    pub pending: i64,
}

pub fn earnings<'a>(
    account_id: AccountId,
    assignments: impl IntoIterator<Item = &'a Assignment>,
) -> DomainResult<Earnings> {
    let active: Vec<&Assignment> = assignments
        .into_iter()
        .filter(|a| a.account_id == account_id && a.is_active())
        .collect();

    Ok(Earnings {
        account_id,
        active_assignments: active.len(),
        allocated: recompute_total(active.iter().filter_map(|a| a.allocated_budget))?,
        received: recompute_total(active.iter().map(|a| a.total_paid))?,
        pending: recompute_total(active.iter().map(|a| a.pending()))?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub name: String,
    /// Assignments that have not been removed.
    pub team_count: usize,
    pub task_count: usize,
    pub budget: i64,
    pub total_paid: i64,
    pub team_paid: i64,
    pub pending: i64,
}

pub fn project_summary<'a>(
    project: &Project,
    assignments: impl IntoIterator<Item = &'a Assignment>,
    tasks: impl IntoIterator<Item = &'a Task>,
) -> ProjectSummary {
    let team_count = assignments
        .into_iter()
        .filter(|a| a.project_id == project.id && a.status != AssignmentStatus::Removed)
        .count();
    let task_count = tasks.into_iter().filter(|t| t.project_id == project.id).count();

    ProjectSummary {
        project_id: project.id,
        name: project.name.clone(),
        team_count,
        task_count,
        budget: project.budget,
        total_paid: project.total_paid,
        team_paid: project.team_paid,
        pending: project.pending(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencyledger_core::{ClientId, OrganizationId};
    use chrono::Utc;

    fn project() -> Project {
        Project::new(OrganizationId::new(), ClientId::new(), "App", 100_000, Utc::now()).unwrap()
    }

    fn assignment(p: &Project, who: AccountId, allocated: Option<i64>, paid: i64) -> Assignment {
        let mut a = Assignment::new(p, who, "dev", allocated, Utc::now()).unwrap();
        a.total_paid = paid;
        a
    }

    #[test]
    fn earnings_sum_only_active_assignments_of_the_account() {
        let p = project();
        let me = AccountId::new();
        let mut finished = assignment(&p, me, Some(9_000), 9_000);
        finished.status = AssignmentStatus::Completed;
        let rows = vec![
            assignment(&p, me, Some(50_000), 15_000),
            assignment(&p, me, Some(10_000), 12_000),
            assignment(&p, me, None, 3_000),
            assignment(&p, AccountId::new(), Some(70_000), 0),
            finished,
        ];

        let e = earnings(me, &rows).unwrap();
        assert_eq!(e.active_assignments, 3);
        assert_eq!(e.allocated, 60_000);
        assert_eq!(e.received, 30_000);
        assert_eq!(e.pending, 35_000);
    }

    #[test]
    fn summary_counts_team_and_tasks() {
        let mut p = project();
        p.total_paid = 40_000;
        let mut removed = assignment(&p, AccountId::new(), None, 0);
        removed.status = AssignmentStatus::Removed;
        let team = vec![assignment(&p, AccountId::new(), None, 0), removed];
        let tasks = vec![Task::new(&p, "Wireframes", None), Task::new(&p, "Copy", None)];

        let s = project_summary(&p, &team, &tasks);
        assert_eq!(s.team_count, 1);
        assert_eq!(s.task_count, 2);
        assert_eq!(s.pending, 60_000);
    }
}
