use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Append one row to the platform audit trail.
///
/// Callers: the cross-tenant bypass (before any data access), auth flows
/// (registration, login), and tenant lifecycle changes. The table is not
/// tenant-scoped; `tenant_id` here only says which tenant was touched.
pub async fn record_audit_event(
    pool: &PgPool,
    actor: &str,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    tenant_id: Option<Uuid>,
    reason: Option<&str>,
    detail: Value,
) -> Result<(), sqlx::Error> {
    tracing::info!(actor, action, resource_type, ?tenant_id, "audit event");

    sqlx::query(
        "INSERT INTO \"audit_events\" \
         (\"id\", \"actor\", \"action\", \"resource_type\", \"resource_id\", \"tenant_id\", \"reason\", \"detail\", \"created_at\") \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::new_v4())
    .bind(actor)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(tenant_id)
    .bind(reason)
    .bind(detail)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}
