use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{AlertSeverity, AlertType};
use crate::database::ScopeError;
use crate::tenancy::{TenancyError, TenantContext};

/// Outcome of one evaluation pass over a single tenant.
#[derive(Debug, Default, Serialize)]
pub struct AlertRunSummary {
    pub budgets_checked: u32,
    pub accounts_checked: u32,
    pub alerts_raised: u32,
}

#[derive(Debug, sqlx::FromRow)]
struct BudgetSpend {
    id: Uuid,
    name: String,
    amount: Decimal,
    currency: String,
    alert_threshold: i32,
    spent: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountBalance {
    id: Uuid,
    name: String,
    currency: String,
    low_balance_threshold: Decimal,
    balance: Decimal,
}

/// Budget and balance evaluation for one tenant.
///
/// Like the scoped repository, an instance cannot exist without a tenant:
/// requests construct it from their context, and the CLI's all-tenants sweep
/// constructs one per tenant through the audited bypass. Every aggregate it
/// runs carries the tenant predicate.
pub struct AlertService {
    pool: PgPool,
    tenant_id: Uuid,
}

impl AlertService {
    pub fn for_context(pool: &PgPool, context: &TenantContext) -> Result<Self, TenancyError> {
        Ok(Self { pool: pool.clone(), tenant_id: context.tenant_id()? })
    }

    pub fn for_tenant(access: &crate::database::CrossTenantAccess) -> Self {
        Self { pool: access.pool().clone(), tenant_id: access.tenant_id() }
    }

    /// Run the full evaluation pass: budget thresholds, then account
    /// balances. Idempotent; re-running refreshes existing alerts instead of
    /// duplicating them.
    pub async fn evaluate(&self) -> Result<AlertRunSummary, ScopeError> {
        let mut summary = AlertRunSummary::default();
        self.evaluate_budgets(&mut summary).await?;
        self.evaluate_balances(&mut summary).await?;

        info!(
            tenant_id = %self.tenant_id,
            budgets = summary.budgets_checked,
            accounts = summary.accounts_checked,
            raised = summary.alerts_raised,
            "alert evaluation finished"
        );
        Ok(summary)
    }

    /// Compare each active budget's period-to-date spend against its alert
    /// threshold. Spend counts expenses on the budget's project (narrowed to
    /// its category when one is set) dated inside the budget period.
    async fn evaluate_budgets(&self, summary: &mut AlertRunSummary) -> Result<(), ScopeError> {
        let budgets = sqlx::query_as::<_, BudgetSpend>(
            "SELECT b.\"id\", b.\"name\", b.\"amount\", b.\"currency\", b.\"alert_threshold\", \
                    COALESCE(SUM(e.\"amount\"), 0) AS spent \
             FROM \"budgets\" b \
             LEFT JOIN \"expenses\" e \
               ON e.\"tenant_id\" = b.\"tenant_id\" \
              AND e.\"project_id\" = b.\"project_id\" \
              AND (b.\"category_id\" IS NULL OR e.\"category_id\" = b.\"category_id\") \
              AND e.\"expense_date\" >= b.\"start_date\" \
              AND e.\"expense_date\" <= b.\"end_date\" \
              AND e.\"is_deleted\" = false \
             WHERE b.\"tenant_id\" = $1 \
               AND b.\"is_active\" = true \
               AND b.\"alert_enabled\" = true \
               AND b.\"is_deleted\" = false \
             GROUP BY b.\"id\", b.\"name\", b.\"amount\", b.\"currency\", b.\"alert_threshold\"",
        )
        .bind(self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        for budget in budgets {
            summary.budgets_checked += 1;
            if budget.amount <= Decimal::ZERO {
                continue;
            }

            let utilization = budget.spent * Decimal::from(100) / budget.amount;
            debug!(budget = %budget.name, %utilization, "budget evaluated");

            if utilization >= Decimal::from(100) {
                self.upsert_alert(
                    AlertType::BudgetExceeded,
                    AlertSeverity::Critical,
                    "budget",
                    budget.id,
                    format!("Budget '{}' exceeded", budget.name),
                    format!(
                        "Spend of {} {} is over the budgeted {} {}",
                        budget.spent, budget.currency, budget.amount, budget.currency
                    ),
                )
                .await?;
                summary.alerts_raised += 1;
            } else if utilization >= Decimal::from(budget.alert_threshold) {
                self.upsert_alert(
                    AlertType::BudgetThreshold,
                    AlertSeverity::Warning,
                    "budget",
                    budget.id,
                    format!("Budget '{}' at {:.0}%", budget.name, utilization),
                    format!(
                        "Spend of {} {} has passed the {}% alert threshold",
                        budget.spent, budget.currency, budget.alert_threshold
                    ),
                )
                .await?;
                summary.alerts_raised += 1;
            }
        }
        Ok(())
    }

    /// Flag accounts whose balance (opening balance minus expenses charged
    /// to them) has fallen to or below their configured floor.
    async fn evaluate_balances(&self, summary: &mut AlertRunSummary) -> Result<(), ScopeError> {
        let accounts = sqlx::query_as::<_, AccountBalance>(
            "SELECT a.\"id\", a.\"name\", a.\"currency\", a.\"low_balance_threshold\", \
                    a.\"opening_balance\" - COALESCE(SUM(e.\"amount\"), 0) AS balance \
             FROM \"accounts\" a \
             LEFT JOIN \"expenses\" e \
               ON e.\"tenant_id\" = a.\"tenant_id\" \
              AND e.\"account_id\" = a.\"id\" \
              AND e.\"is_deleted\" = false \
             WHERE a.\"tenant_id\" = $1 \
               AND a.\"is_archived\" = false \
               AND a.\"is_deleted\" = false \
               AND a.\"low_balance_threshold\" IS NOT NULL \
             GROUP BY a.\"id\", a.\"name\", a.\"currency\", a.\"low_balance_threshold\", a.\"opening_balance\"",
        )
        .bind(self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        for account in accounts {
            summary.accounts_checked += 1;
            if account.balance > account.low_balance_threshold {
                continue;
            }

            let severity = if account.balance < Decimal::ZERO {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            self.upsert_alert(
                AlertType::LowBalance,
                severity,
                "account",
                account.id,
                format!("Account '{}' balance is low", account.name),
                format!(
                    "Balance of {} {} is at or below the {} {} floor",
                    account.balance,
                    account.currency,
                    account.low_balance_threshold,
                    account.currency
                ),
            )
            .await?;
            summary.alerts_raised += 1;
        }
        Ok(())
    }

    /// One live alert per (type, entity). Refreshing an existing alert
    /// resets its read and dismissed flags so it resurfaces.
    async fn upsert_alert(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        entity_type: &str,
        entity_id: Uuid,
        title: String,
        message: String,
    ) -> Result<(), ScopeError> {
        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE \"alerts\" SET \"severity\" = $1, \"title\" = $2, \"message\" = $3, \
             \"is_read\" = false, \"is_dismissed\" = false, \"updated_at\" = $4 \
             WHERE \"tenant_id\" = $5 AND \"alert_type\" = $6 \
               AND \"entity_type\" = $7 AND \"entity_id\" = $8 AND \"is_deleted\" = false",
        )
        .bind(severity)
        .bind(&title)
        .bind(&message)
        .bind(now)
        .bind(self.tenant_id)
        .bind(alert_type)
        .bind(entity_type)
        .bind(entity_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO \"alerts\" \
                 (\"id\", \"tenant_id\", \"alert_type\", \"severity\", \"entity_type\", \"entity_id\", \
                  \"title\", \"message\", \"is_read\", \"is_dismissed\", \
                  \"created_at\", \"updated_at\", \"is_deleted\") \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, false, $9, $9, false)",
            )
            .bind(Uuid::new_v4())
            .bind(self.tenant_id)
            .bind(alert_type)
            .bind(severity)
            .bind(entity_type)
            .bind(entity_id)
            .bind(&title)
            .bind(&message)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
