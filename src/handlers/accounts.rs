use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::Account;
use crate::database::{Record, ScopedRepository};
use crate::filter::FilterData;
use crate::handlers::enforce_plan_limit;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list).post(create))
        .route("/accounts/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
    pub include_archived: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Account>> {
    let repo = ScopedRepository::<Account>::for_context(&state.pool, &context)?;

    let mut conditions = Map::new();
    if let Some(kind) = query.kind {
        conditions.insert("kind".to_string(), Value::String(kind));
    }
    if !query.include_archived.unwrap_or(false) {
        conditions.insert("is_archived".to_string(), Value::Bool(false));
    }
    let data = FilterData {
        where_clause: (!conditions.is_empty()).then_some(Value::Object(conditions)),
        order: Some(json!([{ "name": "asc" }])),
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };

    Ok(ApiResponse::success(repo.select_any(data).await?))
}

async fn create(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<Value>,
) -> ApiResult<Account> {
    let repo = ScopedRepository::<Account>::for_context(&state.pool, &context)?;
    enforce_plan_limit(&repo, context.tenant()?.limits.max_accounts, "accounts").await?;

    let record = Record::from_api_input(body)?;
    record.validate_required_fields(&["name", "kind"])?;

    let account = repo.insert_created_by(record, principal.user_id).await?;
    Ok(ApiResponse::created(account))
}

async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Account> {
    let repo = ScopedRepository::<Account>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.fetch_by_id(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Account> {
    let repo = ScopedRepository::<Account>::for_context(&state.pool, &context)?;
    let record = Record::from_api_input(body)?;
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

async fn remove(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let repo = ScopedRepository::<Account>::for_context(&state.pool, &context)?;
    repo.soft_delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}
