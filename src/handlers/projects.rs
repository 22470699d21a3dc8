use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::Project;
use crate::database::{Record, ScopedRepository};
use crate::filter::FilterData;
use crate::handlers::enforce_plan_limit;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list).post(create))
        .route("/projects/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Project>> {
    let repo = ScopedRepository::<Project>::for_context(&state.pool, &context)?;

    let mut conditions = Map::new();
    if let Some(status) = query.status {
        conditions.insert("status".to_string(), Value::String(status));
    }
    let data = FilterData {
        where_clause: (!conditions.is_empty()).then_some(Value::Object(conditions)),
        order: Some(json!([{ "created_at": "desc" }])),
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
) -> ApiResult<Project> {
    let repo = ScopedRepository::<Project>::for_context(&state.pool, &context)?;
    enforce_plan_limit(&repo, context.tenant()?.limits.max_projects, "projects").await?;

    let record = Record::from_api_input(body)?;
    record.validate_required_fields(&["name"])?;

    let project = repo.insert_created_by(record, principal.user_id).await?;
    Ok(ApiResponse::created(project))
}

async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Project> {
    let repo = ScopedRepository::<Project>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.fetch_by_id(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Project> {
    let repo = ScopedRepository::<Project>::for_context(&state.pool, &context)?;
    let record = Record::from_api_input(body)?;
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

async fn remove(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let repo = ScopedRepository::<Project>::for_context(&state.pool, &context)?;
    repo.soft_delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}
