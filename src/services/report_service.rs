use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::Project;
use crate::database::{ScopeError, ScopedRepository};
use crate::filter::FilterData;
use crate::tenancy::{TenancyError, TenantContext};

#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub project: Project,
    pub total_spend: Decimal,
    pub expense_count: i64,
    pub remaining_budget: Decimal,
    /// Spend as a percentage of the starting budget; zero when no budget.
    pub budget_utilization: Decimal,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CategoryTotal {
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub total: Decimal,
    pub expense_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SpendRow {
    total: Decimal,
    count: i64,
}

/// Tenant-scoped aggregates for the reporting endpoints.
///
/// Same construction rule as every other data path: no tenant, no service.
/// The joins here span several tenant-owned tables and each one carries the
/// tenant predicate, not just the outermost.
pub struct ReportService {
    pool: PgPool,
    context: TenantContext,
}

impl ReportService {
    pub fn for_context(pool: &PgPool, context: &TenantContext) -> Result<Self, TenancyError> {
        context.tenant_id()?;
        Ok(Self { pool: pool.clone(), context: context.clone() })
    }

    /// Totals and budget utilization for one project. The project itself is
    /// fetched through the scoped repository, so another tenant's project id
    /// yields NotFound before any aggregation runs.
    pub async fn project_summary(&self, project_id: Uuid) -> Result<ProjectSummary, ScopeError> {
        let projects = ScopedRepository::<Project>::for_context(&self.pool, &self.context)?;
        let project = projects.fetch_by_id(project_id).await?;

        let spend = sqlx::query_as::<_, SpendRow>(
            "SELECT COALESCE(SUM(\"amount\"), 0) AS total, COUNT(*) AS count \
             FROM \"expenses\" \
             WHERE \"tenant_id\" = $1 AND \"project_id\" = $2 AND \"is_deleted\" = false",
        )
        .bind(projects.tenant_id())
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let utilization = if project.starting_budget > Decimal::ZERO {
            spend.total * Decimal::from(100) / project.starting_budget
        } else {
            Decimal::ZERO
        };

        Ok(ProjectSummary {
            remaining_budget: project.starting_budget - spend.total,
            budget_utilization: utilization.round_dp(2),
            total_spend: spend.total,
            expense_count: spend.count,
            project,
        })
    }

    /// Per-category expense totals, optionally bounded by expense date.
    /// Uncategorized spend comes back as a row with a null category.
    pub async fn category_breakdown(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<Vec<CategoryTotal>, ScopeError> {
        let tenant_id = self.context.tenant_id().map_err(ScopeError::Tenancy)?;

        let rows = sqlx::query_as::<_, CategoryTotal>(
            "SELECT e.\"category_id\", c.\"name\" AS category_name, \
                    COALESCE(SUM(e.\"amount\"), 0) AS total, COUNT(e.\"id\") AS expense_count \
             FROM \"expenses\" e \
             LEFT JOIN \"categories\" c \
               ON c.\"id\" = e.\"category_id\" AND c.\"tenant_id\" = e.\"tenant_id\" \
             WHERE e.\"tenant_id\" = $1 \
               AND e.\"is_deleted\" = false \
               AND ($2::date IS NULL OR e.\"expense_date\" >= $2) \
               AND ($3::date IS NULL OR e.\"expense_date\" <= $3) \
             GROUP BY e.\"category_id\", c.\"name\" \
             ORDER BY total DESC",
        )
        .bind(tenant_id)
        .bind(date_from)
        .bind(date_to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
