use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Category;
use crate::database::{Record, ScopedRepository};
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::tenancy::TenantContext;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/:id", get(show).patch(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> ApiResult<Vec<Category>> {
    let repo = ScopedRepository::<Category>::for_context(&state.pool, &context)?;
    let data = FilterData { order: Some(json!([{ "name": "asc" }])), ..Default::default() };
    Ok(ApiResponse::success(repo.select_any(data).await?))
}

/// Names are unique per tenant (enforced by a partial unique index); a
/// duplicate surfaces as a 409. A `parent_id` pointing at another tenant's
/// category is rejected by the repository's foreign-key check.
async fn create(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Json(body): Json<Value>,
) -> ApiResult<Category> {
    let repo = ScopedRepository::<Category>::for_context(&state.pool, &context)?;
    let record = Record::from_api_input(body)?;
    record.validate_required_fields(&["name"])?;

    let category = repo.insert(record).await?;
    Ok(ApiResponse::created(category))
}

async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Category> {
    let repo = ScopedRepository::<Category>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.fetch_by_id(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Category> {
    let repo = ScopedRepository::<Category>::for_context(&state.pool, &context)?;
    let record = Record::from_api_input(body)?;
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

async fn remove(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let repo = ScopedRepository::<Category>::for_context(&state.pool, &context)?;
    repo.soft_delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}
