//! PostgreSQL ledger store.
//!
//! ## Mutation protocol
//!
//! Every mutation is one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` the target row. For an assignment, the parent
//!    project row is locked next (always assignment before project).
//! 2. Load the target's live payments and validate against them.
//! 3. Insert or delete the payment.
//! 4. Re-sum with `COALESCE(SUM(amount), 0)::BIGINT` and write the derived
//!    total only where it differs, then re-sum the project's `team_paid`.
//! 5. Commit.
//!
//! Any error rolls the whole transaction back.
//!
//! ## Error mapping
//!
//! | Source | SQLSTATE | `StoreError` |
//! |---|---|---|
//! | unique violation | `23505` | `Domain(Conflict)` |
//! | foreign key violation | `23503` | `Domain(NotFound)` |
//! | check violation | `23514` | `Domain(Validation)` |
//! | numeric out of range (`SUM` overflow) | `22003` | `Domain(ConsistencyViolation)` |
//! | anything else | | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use agencyledger_core::{
    AccountId, Amount, AssignmentId, ClientId, DomainError, OrganizationId, PaymentId, ProjectId,
    TaskId,
};
use agencyledger_ledger::{
    Assignment, Expense, ExpenseType, LedgerUpdate, LivePayment, NewPayment, Payment,
    PaymentPhase, PaymentScope, PaymentStatus, PaymentTarget, Project, ProjectSummary,
    RecomputeOutcome, TargetLedger, Task, project_summary,
};

use super::{LedgerStore, StoreError, Subject};

type Tx = Transaction<'static, Postgres>;

/// Where a target's payments and derived total live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargetColumns {
    /// Foreign-key column on `payments`.
    payment_column: &'static str,
    table: &'static str,
    total_column: &'static str,
}

fn columns(target: PaymentTarget) -> TargetColumns {
    match target {
        PaymentTarget::Project(_) => TargetColumns {
            payment_column: "project_id",
            table: "projects",
            total_column: "total_paid",
        },
        PaymentTarget::Assignment(_) => TargetColumns {
            payment_column: "assignment_id",
            table: "project_team_members",
            total_column: "total_paid",
        },
        PaymentTarget::Expense(_) => TargetColumns {
            payment_column: "expense_id",
            table: "expenses",
            total_column: "paid_amount",
        },
    }
}

/// Locked target plus what the outcome needs after the write.
#[derive(Debug)]
struct Locked {
    ledger: TargetLedger,
    /// Parent project, for assignment targets.
    project_id: Option<ProjectId>,
    /// Expected total the payment status is measured against.
    status_basis: Option<Option<i64>>,
}

pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn begin(&self) -> Result<Tx, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn finish<T>(tx: Tx, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            Ok(value)
        }
        Err(err) => {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            Err(err)
        }
    }
}

// ─── Transaction steps ──────────────────────────────────────────────────────

async fn lock_target(
    tx: &mut Tx,
    organization_id: OrganizationId,
    target: PaymentTarget,
) -> Result<Locked, StoreError> {
    let org = *organization_id.as_uuid();

    let (ceiling, accepts_payments, project_id, status_basis) = match target {
        PaymentTarget::Project(id) => {
            sqlx::query("SELECT id FROM projects WHERE id = $1 AND organization_id = $2 FOR UPDATE")
                .bind(id.as_uuid())
                .bind(org)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("lock_project", e))?
                .ok_or(DomainError::NotFound)?;
            (None, true, None, None)
        }
        PaymentTarget::Assignment(id) => {
            let row = sqlx::query(
                r#"
                SELECT project_id, allocated_budget
                FROM project_team_members
                WHERE id = $1 AND organization_id = $2
                FOR UPDATE
                "#,
            )
            .bind(id.as_uuid())
            .bind(org)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_assignment", e))?
            .ok_or(DomainError::NotFound)?;

            let project_id: Uuid = get(&row, "project_id")?;
            let allocated: Option<i64> = get(&row, "allocated_budget")?;

            sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
                .bind(project_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("lock_parent_project", e))?
                .ok_or(DomainError::NotFound)?;

            (
                allocated,
                true,
                Some(ProjectId::from_uuid(project_id)),
                Some(allocated),
            )
        }
        PaymentTarget::Expense(id) => {
            let row = sqlx::query(
                r#"
                SELECT expense_type, total_amount
                FROM expenses
                WHERE id = $1 AND organization_id = $2
                FOR UPDATE
                "#,
            )
            .bind(id.as_uuid())
            .bind(org)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_expense", e))?
            .ok_or(DomainError::NotFound)?;

            let expense_type: ExpenseType = parse(get::<String>(&row, "expense_type")?)?;
            let total_amount: i64 = get(&row, "total_amount")?;
            let accepts = expense_type == ExpenseType::Team;
            (None, accepts, None, accepts.then_some(Some(total_amount)))
        }
    };

    let live = load_live(tx, organization_id, target).await?;

    Ok(Locked {
        ledger: TargetLedger {
            target,
            organization_id,
            ceiling,
            accepts_payments,
            live,
        },
        project_id,
        status_basis,
    })
}

async fn load_live(
    tx: &mut Tx,
    organization_id: OrganizationId,
    target: PaymentTarget,
) -> Result<Vec<LivePayment>, StoreError> {
    let sql = format!(
        "SELECT id, amount, payment_type FROM payments WHERE {} = $1 AND organization_id = $2 ORDER BY created_at, id",
        columns(target).payment_column
    );
    let rows = sqlx::query(&sql)
        .bind(target.id())
        .bind(organization_id.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_live_payments", e))?;

    rows.iter()
        .map(|row| {
            Ok(LivePayment {
                id: PaymentId::from_uuid(get(row, "id")?),
                amount: get(row, "amount")?,
                payment_type: parse(get::<String>(row, "payment_type")?)?,
            })
        })
        .collect()
}

/// Re-sum the target (and the parent project's `team_paid`) inside `tx`.
async fn recompute_in_tx(
    tx: &mut Tx,
    organization_id: OrganizationId,
    locked: &Locked,
) -> Result<RecomputeOutcome, StoreError> {
    let target = locked.ledger.target;
    let cols = columns(target);
    let org = *organization_id.as_uuid();

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE {} = $1 AND organization_id = $2",
        cols.payment_column
    ))
    .bind(target.id())
    .bind(org)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("sum_payments", e))?;
    if total < 0 {
        return Err(DomainError::consistency(format!("{target} re-summed to {total}")).into());
    }

    let mut changed = sqlx::query(&format!(
        "UPDATE {table} SET {col} = $1 WHERE id = $2 AND organization_id = $3 AND {col} <> $1",
        table = cols.table,
        col = cols.total_column
    ))
    .bind(total)
    .bind(target.id())
    .bind(org)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("write_total", e))?
    .rows_affected()
        > 0;

    let mut project_team_paid = None;
    if let Some(project_id) = locked.project_id {
        let team_paid: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_paid), 0)::BIGINT FROM project_team_members WHERE project_id = $1",
        )
        .bind(project_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("sum_team_paid", e))?;
        if team_paid < 0 {
            return Err(DomainError::consistency(format!(
                "project {project_id} team_paid re-summed to {team_paid}"
            ))
            .into());
        }

        changed |= sqlx::query(
            "UPDATE projects SET team_paid = $1 WHERE id = $2 AND team_paid <> $1",
        )
        .bind(team_paid)
        .bind(project_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_team_paid", e))?
        .rows_affected()
            > 0;
        project_team_paid = Some(team_paid);
    }

    let live = load_live(tx, organization_id, target).await?;

    Ok(RecomputeOutcome {
        target,
        total_paid: total,
        payment_status: locked
            .status_basis
            .map(|expected| PaymentStatus::derive(total, expected)),
        phase: PaymentPhase::derive(live.iter().map(|p| p.payment_type)),
        project_team_paid,
        changed,
    })
}

// ─── Row mapping ────────────────────────────────────────────────────────────

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to decode column {column}: {e}")))
}

fn parse<T>(raw: String) -> Result<T, StoreError>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| StoreError::Backend(format!("corrupt row: {e}")))
}

const PAYMENT_COLUMNS: &str = "id, organization_id, project_id, assignment_id, expense_id, \
    amount, paid_on, payment_type, notes, created_by, created_at";

fn payment_from_row(row: &PgRow) -> Result<Payment, StoreError> {
    let target = match (
        get::<Option<Uuid>>(row, "project_id")?,
        get::<Option<Uuid>>(row, "assignment_id")?,
        get::<Option<Uuid>>(row, "expense_id")?,
    ) {
        (Some(id), None, None) => PaymentTarget::from_parts(PaymentScope::Project, id),
        (None, Some(id), None) => PaymentTarget::from_parts(PaymentScope::TeamAssignment, id),
        (None, None, Some(id)) => PaymentTarget::from_parts(PaymentScope::Expense, id),
        _ => return Err(StoreError::Backend("payment row without a single target".to_string())),
    };
    let amount = Amount::new(get(row, "amount")?)
        .map_err(|e| StoreError::Backend(format!("corrupt row: {e}")))?;

    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        target,
        amount,
        paid_on: get(row, "paid_on")?,
        payment_type: parse(get::<String>(row, "payment_type")?)?,
        notes: get(row, "notes")?,
        created_by: AccountId::from_uuid(get(row, "created_by")?),
        created_at: get(row, "created_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, StoreError> {
    Ok(Project {
        id: ProjectId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        client_id: ClientId::from_uuid(get(row, "client_id")?),
        name: get(row, "name")?,
        status: parse(get::<String>(row, "status")?)?,
        budget: get(row, "budget")?,
        total_paid: get(row, "total_paid")?,
        team_paid: get(row, "team_paid")?,
        position: get(row, "position")?,
        created_at: get(row, "created_at")?,
    })
}

fn assignment_from_row(row: &PgRow) -> Result<Assignment, StoreError> {
    Ok(Assignment {
        id: AssignmentId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        project_id: ProjectId::from_uuid(get(row, "project_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        role: get(row, "role")?,
        allocated_budget: get(row, "allocated_budget")?,
        total_paid: get(row, "total_paid")?,
        status: parse(get::<String>(row, "status")?)?,
        created_at: get(row, "created_at")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<Task, StoreError> {
    Ok(Task {
        id: TaskId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        project_id: ProjectId::from_uuid(get(row, "project_id")?),
        assignee: get::<Option<Uuid>>(row, "assignee")?.map(AccountId::from_uuid),
        title: get(row, "title")?,
        status: parse(get::<String>(row, "status")?)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::conflict(msg).into(),
                Some("23503") => DomainError::NotFound.into(),
                Some("23514") => DomainError::validation(msg).into(),
                // SUM(...)::BIGINT past i64.
                Some("22003") => DomainError::consistency(msg).into(),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// ─── LedgerStore ────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(operation = tracing::field::Empty, target = %target), err)]
    async fn subject(&self, target: PaymentTarget) -> Result<Option<Subject>, StoreError> {
        Span::current().record("operation", "subject");

        let (table, assignees_sql) = match target {
            PaymentTarget::Project(_) => (
                "projects",
                Some("SELECT account_id FROM project_team_members WHERE project_id = $1 AND status <> 'removed'"),
            ),
            PaymentTarget::Assignment(_) => (
                "project_team_members",
                Some("SELECT account_id FROM project_team_members WHERE id = $1"),
            ),
            PaymentTarget::Expense(_) => ("expenses", None),
        };

        let organization_id: Option<Uuid> =
            sqlx::query_scalar(&format!("SELECT organization_id FROM {table} WHERE id = $1"))
                .bind(target.id())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("subject", e))?;
        let Some(organization_id) = organization_id else {
            return Ok(None);
        };

        let assignees = match assignees_sql {
            Some(sql) => sqlx::query_scalar::<_, Uuid>(sql)
                .bind(target.id())
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("subject_assignees", e))?
                .into_iter()
                .map(AccountId::from_uuid)
                .collect(),
            None => Vec::new(),
        };

        Ok(Some(Subject {
            organization_id: OrganizationId::from_uuid(organization_id),
            assignees,
        }))
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, payment_id = %id), err)]
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Span::current().record("operation", "payment");

        let row = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("payment", e))?;
        row.as_ref().map(payment_from_row).transpose()
    }

    #[instrument(
        skip(self, payment),
        fields(
            operation = tracing::field::Empty,
            organization_id = %organization_id,
            target = %payment.target,
            amount = payment.amount,
            payment_type = payment.payment_type.as_str()
        ),
        err
    )]
    async fn record_payment(
        &self,
        organization_id: OrganizationId,
        payment: NewPayment,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> Result<LedgerUpdate, StoreError> {
        Span::current().record("operation", "record_payment");

        let mut tx = self.begin().await?;
        let result = async {
            let locked = lock_target(&mut tx, organization_id, payment.target).await?;
            locked
                .ledger
                .check_record(payment.validated_amount()?)?;

            let payment = payment.into_payment(organization_id, created_by, now)?;
            sqlx::query(&format!(
                r#"
                INSERT INTO payments (
                    id, organization_id, {target_column}, amount, paid_on,
                    payment_type, notes, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
                target_column = columns(payment.target).payment_column
            ))
            .bind(payment.id.as_uuid())
            .bind(organization_id.as_uuid())
            .bind(payment.target.id())
            .bind(payment.amount.get())
            .bind(payment.paid_on)
            .bind(payment.payment_type.as_str())
            .bind(&payment.notes)
            .bind(payment.created_by.as_uuid())
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", e))?;

            let outcome = recompute_in_tx(&mut tx, organization_id, &locked).await?;
            Ok::<_, StoreError>(LedgerUpdate { payment, outcome })
        }
        .await;

        finish(tx, result).await
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, organization_id = %organization_id, payment_id = %payment_id), err)]
    async fn delete_payment(
        &self,
        organization_id: OrganizationId,
        payment_id: PaymentId,
    ) -> Result<LedgerUpdate, StoreError> {
        Span::current().record("operation", "delete_payment");

        let mut tx = self.begin().await?;
        let result = async {
            let row = sqlx::query(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND organization_id = $2"
            ))
            .bind(payment_id.as_uuid())
            .bind(organization_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_payment", e))?
            .ok_or(DomainError::NotFound)?;
            let payment = payment_from_row(&row)?;

            let locked = lock_target(&mut tx, organization_id, payment.target).await?;
            locked.ledger.check_delete(payment_id)?;

            sqlx::query("DELETE FROM payments WHERE id = $1 AND organization_id = $2")
                .bind(payment_id.as_uuid())
                .bind(organization_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_payment", e))?;

            let outcome = recompute_in_tx(&mut tx, organization_id, &locked).await?;
            Ok::<_, StoreError>(LedgerUpdate { payment, outcome })
        }
        .await;

        finish(tx, result).await
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, organization_id = %organization_id, target = %target), err)]
    async fn recompute(
        &self,
        organization_id: OrganizationId,
        target: PaymentTarget,
    ) -> Result<RecomputeOutcome, StoreError> {
        Span::current().record("operation", "recompute");

        let mut tx = self.begin().await?;
        let result = async {
            let locked = lock_target(&mut tx, organization_id, target).await?;
            recompute_in_tx(&mut tx, organization_id, &locked).await
        }
        .await;

        finish(tx, result).await
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, project_id = %id), err)]
    async fn project(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = $1 AND organization_id = $2")
            .bind(id.as_uuid())
            .bind(organization_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("project", e))?;
        row.as_ref().map(project_from_row).transpose()
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, account_id = %account_id), err)]
    async fn assignments_of(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Assignment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM project_team_members
            WHERE organization_id = $1 AND account_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assignments_of", e))?;
        rows.iter().map(assignment_from_row).collect()
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, account_id = %account_id), err)]
    async fn payments_to(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.organization_id, p.project_id, p.assignment_id, p.expense_id,
                   p.amount, p.paid_on, p.payment_type, p.notes, p.created_by, p.created_at
            FROM payments p
            JOIN project_team_members m ON m.id = p.assignment_id
            WHERE p.organization_id = $1 AND m.organization_id = $1 AND m.account_id = $2
            ORDER BY p.created_at, p.id
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("payments_to", e))?;
        rows.iter().map(payment_from_row).collect()
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, project_id = %id), err)]
    async fn project_summary(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> Result<Option<ProjectSummary>, StoreError> {
        let Some(project) = self.project(organization_id, id).await? else {
            return Ok(None);
        };

        let assignments = sqlx::query("SELECT * FROM project_team_members WHERE project_id = $1")
            .bind(id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("summary_assignments", e))?
            .iter()
            .map(assignment_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let tasks = sqlx::query("SELECT * FROM tasks WHERE project_id = $1")
            .bind(id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("summary_tasks", e))?
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(project_summary(&project, &assignments, &tasks)))
    }

    #[instrument(skip(self, project), fields(organization_id = %project.organization_id, project_id = %project.id), err)]
    async fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects (
                id, organization_id, client_id, name, status, budget,
                total_paid, team_paid, position, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, 0, $7, $8)
            "#,
        )
        .bind(project.id.as_uuid())
        .bind(project.organization_id.as_uuid())
        .bind(project.client_id.as_uuid())
        .bind(&project.name)
        .bind(project.status.as_str())
        .bind(project.budget)
        .bind(project.position)
        .bind(project.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_project", e))?;
        Ok(())
    }

    #[instrument(skip(self, assignment), fields(organization_id = %assignment.organization_id, assignment_id = %assignment.id), err)]
    async fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        // The parent project must belong to the same organization.
        let inserted = sqlx::query(
            r#"
            INSERT INTO project_team_members (
                id, organization_id, project_id, account_id, role,
                allocated_budget, total_paid, status, created_at
            )
            SELECT $1, $2, $3, $4, $5, $6, 0, $7, $8
            WHERE EXISTS (SELECT 1 FROM projects WHERE id = $3 AND organization_id = $2)
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.organization_id.as_uuid())
        .bind(assignment.project_id.as_uuid())
        .bind(assignment.account_id.as_uuid())
        .bind(&assignment.role)
        .bind(assignment.allocated_budget)
        .bind(assignment.status.as_str())
        .bind(assignment.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_assignment", e))?
        .rows_affected();

        if inserted == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }

    #[instrument(skip(self, expense), fields(organization_id = %expense.organization_id, expense_id = %expense.id), err)]
    async fn insert_expense(&self, expense: Expense) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, organization_id, description, expense_type,
                total_amount, paid_amount, created_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            "#,
        )
        .bind(expense.id.as_uuid())
        .bind(expense.organization_id.as_uuid())
        .bind(&expense.description)
        .bind(expense.expense_type.as_str())
        .bind(expense.total_amount)
        .bind(expense.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_expense", e))?;
        Ok(())
    }

    #[instrument(skip(self, task), fields(organization_id = %task.organization_id, task_id = %task.id), err)]
    async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO tasks (id, organization_id, project_id, assignee, title, status)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (SELECT 1 FROM projects WHERE id = $3 AND organization_id = $2)
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(task.organization_id.as_uuid())
        .bind(task.project_id.as_uuid())
        .bind(task.assignee.map(Uuid::from))
        .bind(&task.title)
        .bind(task.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_task", e))?
        .rows_affected();

        if inserted == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }
}
