//! Agency ledger: payments at three levels (project, team assignment,
//! expense) and the derived totals kept equal to them.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod ledger;
pub mod payment;
pub mod phase;
pub mod records;
pub mod reports;
pub mod totals;

pub use ledger::{LedgerUpdate, LivePayment, OrganizationLedger, RecomputeOutcome, TargetLedger};
pub use payment::{NewPayment, Payment, PaymentScope, PaymentTarget, PaymentType};
pub use phase::PaymentPhase;
pub use records::{
    Assignment, AssignmentStatus, Expense, ExpenseType, Project, ProjectStatus, Task, TaskStatus,
};
pub use reports::{Earnings, ProjectSummary, earnings, project_summary};
pub use totals::{PaymentStatus, pending, recompute_total};
