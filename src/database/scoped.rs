use std::marker::PhantomData;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::record::{Record, RecordError};
use crate::filter::{Filter, FilterData, FilterError};
use crate::tenancy::{TenancyError, TenantContext};

/// A foreign key from one tenant-owned table to another. Writes verify the
/// referenced row lives in the same tenant before touching the database.
#[derive(Debug, Clone, Copy)]
pub struct ScopedFk {
    pub column: &'static str,
    pub table: &'static str,
}

/// Implemented by every row type that carries a `tenant_id` column.
pub trait TenantOwned {
    const TABLE: &'static str;
    const TENANT_FKS: &'static [ScopedFk];
}

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error(transparent)]
    Tenancy(#[from] TenancyError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Record not found")]
    NotFound,
    #[error("Cross-tenant access requires an actor and a reason")]
    UnattributedBypass,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Data access pinned to a single tenant.
///
/// Every statement this repository issues carries the tenant predicate: reads
/// go through a scoped [`Filter`], writes stamp `tenant_id` server-side and
/// match on it in their WHERE clause. The only constructor reachable from
/// request handling takes the tenant from the request's [`TenantContext`], so
/// a request without a resolved tenant cannot query tenant-owned tables at
/// all. Rows in other tenants behave exactly like rows that do not exist.
pub struct ScopedRepository<T> {
    pool: PgPool,
    tenant_id: Uuid,
    _phantom: PhantomData<T>,
}

impl<T> ScopedRepository<T>
where
    T: TenantOwned + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    /// Pin a repository to the tenant resolved for this request. Fails with
    /// `TenancyError::Required` when the request resolved no tenant.
    pub fn for_context(pool: &PgPool, context: &TenantContext) -> Result<Self, ScopeError> {
        let tenant_id = context.tenant_id()?;
        Ok(Self { pool: pool.clone(), tenant_id, _phantom: PhantomData })
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn scoped_filter(&self, data: FilterData) -> Result<Filter, ScopeError> {
        let mut filter = Filter::scoped(T::TABLE, self.tenant_id)?;
        filter.assign(data)?;
        Ok(filter)
    }

    pub async fn select_any(&self, data: FilterData) -> Result<Vec<T>, ScopeError> {
        let sql = self.scoped_filter(data)?.to_sql()?;
        let mut query = sqlx::query_as::<_, T>(&sql.query);
        for param in &sql.params {
            query = bind_value_as(query, param);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn select_one(&self, data: FilterData) -> Result<Option<T>, ScopeError> {
        let sql = self.scoped_filter(data)?.to_sql()?;
        let mut query = sqlx::query_as::<_, T>(&sql.query);
        for param in &sql.params {
            query = bind_value_as(query, param);
        }
        Ok(query.fetch_optional(&self.pool).await?)
    }

    /// Like `select_one` but absence is an error. Out-of-tenant rows surface
    /// as `NotFound`, indistinguishable from rows that never existed.
    pub async fn select_404(&self, data: FilterData) -> Result<T, ScopeError> {
        self.select_one(data).await?.ok_or(ScopeError::NotFound)
    }

    pub async fn fetch_by_id(&self, id: Uuid) -> Result<T, ScopeError> {
        self.select_404(FilterData {
            where_clause: Some(json!({ "id": id.to_string() })),
            ..Default::default()
        })
        .await
    }

    pub async fn count(&self, data: FilterData) -> Result<i64, ScopeError> {
        use sqlx::Row;

        let sql = self.scoped_filter(data)?.to_count_sql()?;
        let mut query = sqlx::query(&sql.query);
        for param in &sql.params {
            query = bind_value(query, param);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get("count")?)
    }

    /// Insert a record into this tenant. Identity, tenancy, and lifecycle
    /// columns are stamped here; whatever the caller put in those fields is
    /// overwritten.
    pub async fn insert(&self, mut record: Record) -> Result<T, ScopeError> {
        stamp_for_insert(&mut record, self.tenant_id);
        self.check_tenant_fks(&record).await?;

        let (sql, params) = build_insert_sql(T::TABLE, &record);
        let mut query = sqlx::query_as::<_, T>(&sql);
        for param in &params {
            query = bind_value_as(query, param);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Insert with the acting user recorded in `created_by`.
    pub async fn insert_created_by(&self, mut record: Record, user_id: Uuid) -> Result<T, ScopeError> {
        record.set_system_field("created_by", Value::String(user_id.to_string()));
        self.insert(record).await
    }

    /// Apply a partial update to one row of this tenant. An empty record is a
    /// no-op read.
    pub async fn update_by_id(&self, id: Uuid, mut record: Record) -> Result<T, ScopeError> {
        if record.is_empty() {
            return self.fetch_by_id(id).await;
        }
        self.check_tenant_fks(&record).await?;
        record.set_system_field("updated_at", Value::String(Utc::now().to_rfc3339()));

        let (sql, params) = build_update_sql(T::TABLE, &record, id, self.tenant_id);
        let mut query = sqlx::query_as::<_, T>(&sql);
        for param in &params {
            query = bind_value_as(query, param);
        }
        query.fetch_optional(&self.pool).await?.ok_or(ScopeError::NotFound)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ScopeError> {
        let sql = format!(
            "UPDATE \"{}\" SET \"is_deleted\" = true, \"deleted_at\" = $1, \"updated_at\" = $1 \
             WHERE \"id\" = $2 AND \"tenant_id\" = $3 AND \"is_deleted\" = false",
            T::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(id)
            .bind(self.tenant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ScopeError::NotFound);
        }
        Ok(())
    }

    /// Verify every tenant-owned foreign key in `record` points at a live row
    /// of this tenant. Runs before any write is issued.
    async fn check_tenant_fks(&self, record: &Record) -> Result<(), ScopeError> {
        for fk in T::TENANT_FKS {
            let id = match record.try_uuid(fk.column)? {
                Some(id) => id,
                None => continue,
            };
            let present: bool = sqlx::query_scalar(&fk_exists_sql(fk))
                .bind(id)
                .bind(self.tenant_id)
                .fetch_one(&self.pool)
                .await?;
            if !present {
                return Err(TenancyError::CrossTenantReference { column: fk.column.to_string() }.into());
            }
        }
        Ok(())
    }
}

/// An audited escape hatch for platform operations that must read or write a
/// tenant's rows outside a request: provisioning, seeding, operator tooling.
///
/// Entering records who did it and why in the audit trail before any data
/// access happens; there is no unaudited path to a repository for an
/// arbitrary tenant.
pub struct CrossTenantAccess {
    pool: PgPool,
    tenant_id: Uuid,
}

impl CrossTenantAccess {
    pub async fn enter(
        pool: &PgPool,
        tenant_id: Uuid,
        actor: &str,
        reason: &str,
    ) -> Result<Self, ScopeError> {
        if actor.trim().is_empty() || reason.trim().is_empty() {
            return Err(ScopeError::UnattributedBypass);
        }

        tracing::warn!(%tenant_id, actor, reason, "cross-tenant access opened");
        sqlx::query(
            "INSERT INTO \"audit_events\" \
             (\"id\", \"actor\", \"action\", \"resource_type\", \"resource_id\", \"tenant_id\", \"reason\", \"detail\", \"created_at\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::new_v4())
        .bind(actor)
        .bind("cross_tenant_access")
        .bind("tenant")
        .bind(tenant_id.to_string())
        .bind(tenant_id)
        .bind(reason)
        .bind(json!({}))
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(Self { pool: pool.clone(), tenant_id })
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn repository<T>(&self) -> ScopedRepository<T>
    where
        T: TenantOwned + for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        ScopedRepository { pool: self.pool.clone(), tenant_id: self.tenant_id, _phantom: PhantomData }
    }
}

fn stamp_for_insert(record: &mut Record, tenant_id: Uuid) {
    let now = Utc::now().to_rfc3339();
    record.set_system_field("id", Value::String(Uuid::new_v4().to_string()));
    record.set_system_field("tenant_id", Value::String(tenant_id.to_string()));
    record.set_system_field("created_at", Value::String(now.clone()));
    record.set_system_field("updated_at", Value::String(now));
    record.set_system_field("is_deleted", Value::Bool(false));
}

/// Null fields are omitted: the column stays at its default, and omitting
/// them keeps every bound parameter concretely typed.
fn build_insert_sql(table: &str, record: &Record) -> (String, Vec<Value>) {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();
    for (key, value) in record.fields() {
        if value.is_null() {
            continue;
        }
        params.push(value.clone());
        columns.push(format!("\"{}\"", key));
        placeholders.push(format!("${}", params.len()));
    }
    let query = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    (query, params)
}

/// Explicit nulls render as literal NULL so a PATCH can clear a column.
fn build_update_sql(table: &str, record: &Record, id: Uuid, tenant_id: Uuid) -> (String, Vec<Value>) {
    let mut sets = Vec::new();
    let mut params = Vec::new();
    for (key, value) in record.fields() {
        if value.is_null() {
            sets.push(format!("\"{}\" = NULL", key));
        } else {
            params.push(value.clone());
            sets.push(format!("\"{}\" = ${}", key, params.len()));
        }
    }
    params.push(Value::String(id.to_string()));
    let id_placeholder = params.len();
    params.push(Value::String(tenant_id.to_string()));
    let tenant_placeholder = params.len();
    let query = format!(
        "UPDATE \"{}\" SET {} WHERE \"id\" = ${} AND \"tenant_id\" = ${} AND \"is_deleted\" = false RETURNING *",
        table,
        sets.join(", "),
        id_placeholder,
        tenant_placeholder
    );
    (query, params)
}

fn fk_exists_sql(fk: &ScopedFk) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE \"id\" = $1 AND \"tenant_id\" = $2 AND \"is_deleted\" = false)",
        fk.table
    )
}

/// The concrete Postgres type a JSON parameter binds as. Strings bind by
/// shape: UUIDs, RFC 3339 timestamps, and ISO dates as their native types,
/// everything else as text. Arrays and objects bind as jsonb. Every JSON
/// value maps to exactly one bound parameter so placeholders stay aligned.
#[derive(Debug, PartialEq)]
enum BoundParam<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Text(&'a str),
    OwnedText(String),
    Json(&'a Value),
}

fn classify_param(value: &Value) -> BoundParam<'_> {
    match value {
        Value::Null => BoundParam::Null,
        Value::Bool(b) => BoundParam::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoundParam::Int(i)
            } else if let Some(u) = n.as_u64() {
                BoundParam::Int(u as i64)
            } else if let Some(f) = n.as_f64() {
                BoundParam::Float(f)
            } else {
                BoundParam::OwnedText(n.to_string())
            }
        }
        Value::String(s) => {
            if let Ok(id) = Uuid::parse_str(s) {
                BoundParam::Uuid(id)
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                BoundParam::Timestamp(ts.with_timezone(&Utc))
            } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                BoundParam::Date(date)
            } else {
                BoundParam::Text(s)
            }
        }
        Value::Array(_) | Value::Object(_) => BoundParam::Json(value),
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match classify_param(value) {
        BoundParam::Null => query.bind(None::<String>),
        BoundParam::Bool(b) => query.bind(b),
        BoundParam::Int(i) => query.bind(i),
        BoundParam::Float(f) => query.bind(f),
        BoundParam::Uuid(id) => query.bind(id),
        BoundParam::Timestamp(ts) => query.bind(ts),
        BoundParam::Date(date) => query.bind(date),
        BoundParam::Text(s) => query.bind(s),
        BoundParam::OwnedText(s) => query.bind(s),
        BoundParam::Json(v) => query.bind(v.clone()),
    }
}

fn bind_value_as<'q, O>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    value: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match classify_param(value) {
        BoundParam::Null => query.bind(None::<String>),
        BoundParam::Bool(b) => query.bind(b),
        BoundParam::Int(i) => query.bind(i),
        BoundParam::Float(f) => query.bind(f),
        BoundParam::Uuid(id) => query.bind(id),
        BoundParam::Timestamp(ts) => query.bind(ts),
        BoundParam::Date(date) => query.bind(date),
        BoundParam::Text(s) => query.bind(s),
        BoundParam::OwnedText(s) => query.bind(s),
        BoundParam::Json(v) => query.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Expense;
    use crate::tenancy::TenantResolution;

    fn lazy_pool() -> PgPool {
        crate::database::pool::connect_lazy().unwrap()
    }

    #[tokio::test]
    async fn repository_fails_closed_without_a_tenant() {
        let pool = lazy_pool();
        let context = TenantContext::new();
        context.bind(TenantResolution::None);

        let result = ScopedRepository::<Expense>::for_context(&pool, &context);
        assert!(matches!(result, Err(ScopeError::Tenancy(TenancyError::Required))));
    }

    #[test]
    fn insert_stamping_overrides_caller_fields() {
        let tenant_id = Uuid::new_v4();
        let mut record = Record::new();
        record.set("title", "Team lunch");
        // set() already refuses tenant_id; stamping would overwrite it anyway
        record.set("tenant_id", "11111111-1111-1111-1111-111111111111");
        stamp_for_insert(&mut record, tenant_id);

        assert_eq!(record.get_str("tenant_id"), Some(tenant_id.to_string().as_str()));
        assert!(record.id().is_some());
        assert_eq!(record.get("is_deleted"), Some(&Value::Bool(false)));
        assert!(record.has("created_at") && record.has("updated_at"));
    }

    #[test]
    fn insert_sql_skips_null_columns() {
        let mut record = Record::new();
        record.set("amount", 42);
        record.set("category_id", Value::Null);
        record.set("title", "Cables");

        let (sql, params) = build_insert_sql("expenses", &record);
        assert_eq!(sql, "INSERT INTO \"expenses\" (\"amount\", \"title\") VALUES ($1, $2) RETURNING *");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn update_sql_pins_id_and_tenant_and_renders_null_literals() {
        let id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let mut record = Record::new();
        record.set("category_id", Value::Null);
        record.set("title", "Adapters");
        record.set_system_field("updated_at", "2026-02-01T00:00:00+00:00");

        let (sql, params) = build_update_sql("expenses", &record, id, tenant_id);
        assert_eq!(
            sql,
            "UPDATE \"expenses\" SET \"category_id\" = NULL, \"title\" = $1, \"updated_at\" = $2 \
             WHERE \"id\" = $3 AND \"tenant_id\" = $4 AND \"is_deleted\" = false RETURNING *"
        );
        assert_eq!(params[2], Value::String(id.to_string()));
        assert_eq!(params[3], Value::String(tenant_id.to_string()));
    }

    #[test]
    fn fk_check_sql_requires_same_tenant_live_row() {
        let fk = ScopedFk { column: "project_id", table: "projects" };
        assert_eq!(
            fk_exists_sql(&fk),
            "SELECT EXISTS(SELECT 1 FROM \"projects\" WHERE \"id\" = $1 AND \"tenant_id\" = $2 AND \"is_deleted\" = false)"
        );
    }

    #[test]
    fn every_json_shape_binds_exactly_one_parameter() {
        use serde_json::json;

        // An unbound placeholder would ship a statement with more
        // placeholders than parameters, so no shape may fall through.
        assert_eq!(classify_param(&json!(null)), BoundParam::Null);
        assert_eq!(classify_param(&json!(true)), BoundParam::Bool(true));
        assert_eq!(classify_param(&json!(42)), BoundParam::Int(42));
        assert_eq!(classify_param(&json!(19.99)), BoundParam::Float(19.99));
        assert_eq!(classify_param(&json!("Cables")), BoundParam::Text("Cables"));

        let arr = json!(["a", "b"]);
        assert_eq!(classify_param(&arr), BoundParam::Json(&arr));
        let obj = json!({"nested": true});
        assert_eq!(classify_param(&obj), BoundParam::Json(&obj));
    }

    #[test]
    fn string_parameters_bind_by_shape() {
        let id = Uuid::new_v4();
        assert_eq!(classify_param(&Value::String(id.to_string())), BoundParam::Uuid(id));
        assert!(matches!(
            classify_param(&Value::String("2026-02-01T00:00:00+00:00".into())),
            BoundParam::Timestamp(_)
        ));
        assert!(matches!(
            classify_param(&Value::String("2026-02-01".into())),
            BoundParam::Date(_)
        ));
    }

    #[tokio::test]
    async fn bypass_requires_actor_and_reason() {
        let pool = lazy_pool();
        let result = CrossTenantAccess::enter(&pool, Uuid::new_v4(), "", "backfill").await;
        assert!(matches!(result, Err(ScopeError::UnattributedBypass)));

        let result = CrossTenantAccess::enter(&pool, Uuid::new_v4(), "ops@tally", "  ").await;
        assert!(matches!(result, Err(ScopeError::UnattributedBypass)));
    }
}
