use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::scoped::{ScopedFk, TenantOwned};

/// Expense category. `parent_id` allows one level of nesting and must point
/// at a category inside the same tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantOwned for Category {
    const TABLE: &'static str = "categories";
    const TENANT_FKS: &'static [ScopedFk] =
        &[ScopedFk { column: "parent_id", table: "categories" }];
}
