use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::scoped::{ScopedFk, TenantOwned};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub title: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
    pub receipt_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantOwned for Expense {
    const TABLE: &'static str = "expenses";
    const TENANT_FKS: &'static [ScopedFk] = &[
        ScopedFk { column: "project_id", table: "projects" },
        ScopedFk { column: "account_id", table: "accounts" },
        ScopedFk { column: "category_id", table: "categories" },
        ScopedFk { column: "created_by", table: "users" },
    ];
}
