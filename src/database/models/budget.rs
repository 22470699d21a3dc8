use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::scoped::{ScopedFk, TenantOwned};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Percent of `amount` at which a threshold alert fires (1..=100).
    pub alert_threshold: i32,
    pub alert_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantOwned for Budget {
    const TABLE: &'static str = "budgets";
    const TENANT_FKS: &'static [ScopedFk] = &[
        ScopedFk { column: "project_id", table: "projects" },
        ScopedFk { column: "category_id", table: "categories" },
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Monthly,
    Quarterly,
    Yearly,
}
