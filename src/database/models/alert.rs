use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::scoped::{ScopedFk, TenantOwned};

/// A notification raised by the budget/balance evaluation pass. Alerts are
/// upserted per (type, entity) so re-evaluation refreshes rather than
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantOwned for Alert {
    const TABLE: &'static str = "alerts";
    const TENANT_FKS: &'static [ScopedFk] = &[];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    BudgetThreshold,
    BudgetExceeded,
    LowBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}
