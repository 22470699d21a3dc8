use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform-level audit record. Deliberately not a tenant-owned table: rows
/// are written by cross-tenant maintenance paths and by auth flows, and
/// `tenant_id` is merely descriptive here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub tenant_id: Option<Uuid>,
    pub reason: Option<String>,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
