use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::Expense;
use crate::database::{Record, ScopedRepository};
use crate::filter::FilterData;
use crate::handlers::{enforce_plan_limit, require_positive_amount};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list).post(create))
        .route("/expenses/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub project_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// Inclusive bounds on `expense_date`, ISO dates.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Expense>> {
    let repo = ScopedRepository::<Expense>::for_context(&state.pool, &context)?;

    let mut conditions = Map::new();
    if let Some(id) = query.project_id {
        conditions.insert("project_id".to_string(), Value::String(id.to_string()));
    }
    if let Some(id) = query.account_id {
        conditions.insert("account_id".to_string(), Value::String(id.to_string()));
    }
    if let Some(id) = query.category_id {
        conditions.insert("category_id".to_string(), Value::String(id.to_string()));
    }
    let mut date_bounds = Map::new();
    if let Some(from) = query.date_from {
        date_bounds.insert("$gte".to_string(), Value::String(from));
    }
    if let Some(to) = query.date_to {
        date_bounds.insert("$lte".to_string(), Value::String(to));
    }
    if !date_bounds.is_empty() {
        conditions.insert("expense_date".to_string(), Value::Object(date_bounds));
    }

    let order = match query.order.as_deref() {
        Some("amount") => json!([{ "amount": "desc" }]),
        Some("date") | None => json!([{ "expense_date": "desc" }]),
        Some(other) => json!([{ other: "asc" }]),
    };

    let data = FilterData {
        where_clause: (!conditions.is_empty()).then_some(Value::Object(conditions)),
        order: Some(order),
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };

    Ok(ApiResponse::success(repo.select_any(data).await?))
}

/// POST /api/v1/expenses - record an expense.
///
/// The repository verifies `project_id`, `account_id`, and `category_id`
/// against the current tenant before writing; a foreign key into another
/// tenant is rejected, not persisted.
async fn create(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<Value>,
) -> ApiResult<Expense> {
    let repo = ScopedRepository::<Expense>::for_context(&state.pool, &context)?;
    enforce_plan_limit(&repo, context.tenant()?.limits.max_expenses, "expenses").await?;

    let record = Record::from_api_input(body)?;
    record.validate_required_fields(&["title", "project_id", "expense_date"])?;
    require_positive_amount(&record, "amount")?;
    record.get_uuid("project_id")?;

    let expense = repo.insert_created_by(record, principal.user_id).await?;
    Ok(ApiResponse::created(expense))
}

async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Expense> {
    let repo = ScopedRepository::<Expense>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.fetch_by_id(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Expense> {
    let repo = ScopedRepository::<Expense>::for_context(&state.pool, &context)?;
    let record = Record::from_api_input(body)?;
    if record.has("amount") {
        require_positive_amount(&record, "amount")?;
    }
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

async fn remove(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let repo = ScopedRepository::<Expense>::for_context(&state.pool, &context)?;
    repo.soft_delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}
