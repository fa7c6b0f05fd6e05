//! Ledger-bearing records: projects, team assignments, expenses, tasks.
//!
//! Derived fields (`total_paid`, `team_paid`, `paid_amount`) are only ever
//! written by the ledger recompute path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agencyledger_core::{
    AccountId, AssignmentId, ClientId, DomainError, DomainResult, Entity, ExpenseId,
    OrganizationId, ProjectId, TaskId, TenantOwned,
};

use crate::totals::{PaymentStatus, pending};

macro_rules! tenant_entity {
    ($t:ty, $id:ty) => {
        impl Entity for $t {
            type Id = $id;

            fn id(&self) -> &Self::Id {
                &self.id
            }
        }

        impl TenantOwned for $t {
            fn organization_id(&self) -> OrganizationId {
                self.organization_id
            }
        }
    };
}

fn non_negative(field: &str, value: i64) -> DomainResult<i64> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    New,
    Ongoing,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::New => "new",
            ProjectStatus::Ongoing => "ongoing",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl core::str::FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ProjectStatus::New),
            "ongoing" => Ok(ProjectStatus::Ongoing),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(DomainError::validation(format!("unknown project status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub client_id: ClientId,
    pub name: String,
    pub status: ProjectStatus,
    pub budget: i64,
    /// Σ project-scoped payments.
    pub total_paid: i64,
    /// Σ `total_paid` over this project's assignments.
    pub team_paid: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

tenant_entity!(Project, ProjectId);

impl Project {
    pub fn new(
        organization_id: OrganizationId,
        client_id: ClientId,
        name: impl Into<String>,
        budget: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("project name cannot be empty"));
        }
        Ok(Self {
            id: ProjectId::new(),
            organization_id,
            client_id,
            name: name.trim().to_string(),
            status: ProjectStatus::New,
            budget: non_negative("budget", budget)?,
            total_paid: 0,
            team_paid: 0,
            position: 0,
            created_at: now,
        })
    }

    pub fn pending(&self) -> i64 {
        pending(Some(self.budget), self.total_paid)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Assignment (project team member)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Active,
    Completed,
    Removed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Removed => "removed",
        }
    }
}

impl core::str::FromStr for AssignmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AssignmentStatus::Active),
            "completed" => Ok(AssignmentStatus::Completed),
            "removed" => Ok(AssignmentStatus::Removed),
            other => Err(DomainError::validation(format!("unknown assignment status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub organization_id: OrganizationId,
    pub project_id: ProjectId,
    pub account_id: AccountId,
    /// Free text ("lead designer", "backend").
    pub role: String,
    /// `None` = unconstrained.
    pub allocated_budget: Option<i64>,
    pub total_paid: i64,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

tenant_entity!(Assignment, AssignmentId);

impl Assignment {
    pub fn new(
        project: &Project,
        account_id: AccountId,
        role: impl Into<String>,
        allocated_budget: Option<i64>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let allocated_budget = allocated_budget
            .map(|b| non_negative("allocated_budget", b))
            .transpose()?;
        Ok(Self {
            id: AssignmentId::new(),
            organization_id: project.organization_id,
            project_id: project.id,
            account_id,
            role: role.into().trim().to_string(),
            allocated_budget,
            total_paid: 0,
            status: AssignmentStatus::Active,
            created_at: now,
        })
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::derive(self.total_paid, self.allocated_budget)
    }

    pub fn pending(&self) -> i64 {
        pending(self.allocated_budget, self.total_paid)
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expense
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseType {
    /// Paid out to people in instalments; carries a payment status.
    Team,
    /// A one-off cost. Takes no payment records.
    Other,
}

impl ExpenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseType::Team => "team",
            ExpenseType::Other => "other",
        }
    }
}

impl core::str::FromStr for ExpenseType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(ExpenseType::Team),
            "other" => Ok(ExpenseType::Other),
            other => Err(DomainError::validation(format!("unknown expense type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub organization_id: OrganizationId,
    pub description: String,
    pub expense_type: ExpenseType,
    /// Expected total for team expenses, the cost itself for `other`.
    pub total_amount: i64,
    /// Σ expense-scoped payments; always 0 for `other`.
    pub paid_amount: i64,
    pub created_at: DateTime<Utc>,
}

tenant_entity!(Expense, ExpenseId);

impl Expense {
    pub fn new(
        organization_id: OrganizationId,
        description: impl Into<String>,
        expense_type: ExpenseType,
        total_amount: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: ExpenseId::new(),
            organization_id,
            description: description.into().trim().to_string(),
            expense_type,
            total_amount: non_negative("total_amount", total_amount)?,
            paid_amount: 0,
            created_at: now,
        })
    }

    pub fn accepts_payments(&self) -> bool {
        self.expense_type == ExpenseType::Team
    }

    /// Only team expenses have a payment status.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.accepts_payments()
            .then(|| PaymentStatus::derive(self.paid_amount, Some(self.total_amount)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl core::str::FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(DomainError::validation(format!("unknown task status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub organization_id: OrganizationId,
    pub project_id: ProjectId,
    pub assignee: Option<AccountId>,
    pub title: String,
    pub status: TaskStatus,
}

tenant_entity!(Task, TaskId);

impl Task {
    pub fn new(project: &Project, title: impl Into<String>, assignee: Option<AccountId>) -> Self {
        Self {
            id: TaskId::new(),
            organization_id: project.organization_id,
            project_id: project.id,
            assignee,
            title: title.into(),
            status: TaskStatus::Todo,
        }
    }
}
