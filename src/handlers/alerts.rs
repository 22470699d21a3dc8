use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::{Alert, Role};
use crate::database::{Record, ScopedRepository};
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::alert_service::{AlertRunSummary, AlertService};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list))
        .route("/alerts/evaluate", post(evaluate))
        .route("/alerts/:id/read", post(mark_read))
        .route("/alerts/:id/dismiss", post(dismiss))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub unread: Option<bool>,
    pub include_dismissed: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Alert>> {
    let repo = ScopedRepository::<Alert>::for_context(&state.pool, &context)?;

    let mut conditions = Map::new();
    if query.unread.unwrap_or(false) {
        conditions.insert("is_read".to_string(), Value::Bool(false));
    }
    if !query.include_dismissed.unwrap_or(false) {
        conditions.insert("is_dismissed".to_string(), Value::Bool(false));
    }
    let data = FilterData {
        where_clause: (!conditions.is_empty()).then_some(Value::Object(conditions)),
        order: Some(json!([{ "updated_at": "desc" }])),
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };

    Ok(ApiResponse::success(repo.select_any(data).await?))
}

/// POST /api/v1/alerts/evaluate - run the budget/balance pass for the
/// current tenant on demand. Admin and up.
async fn evaluate(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<AlertRunSummary> {
    principal.require(Role::Admin)?;

    let service = AlertService::for_context(&state.pool, &context)?;
    let summary = service.evaluate().await.map_err(crate::error::ApiError::from)?;
    Ok(ApiResponse::success(summary))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Alert> {
    set_flag(&state, &context, id, "is_read").await
}

async fn dismiss(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Alert> {
    set_flag(&state, &context, id, "is_dismissed").await
}

async fn set_flag(
    state: &AppState,
    context: &TenantContext,
    id: Uuid,
    flag: &str,
) -> ApiResult<Alert> {
    let repo = ScopedRepository::<Alert>::for_context(&state.pool, context)?;
    let mut record = Record::new();
    record.set(flag, true);
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}
