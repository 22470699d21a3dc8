use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::Budget;
use crate::database::record::RecordError;
use crate::database::{Record, ScopedRepository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::handlers::require_positive_amount;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::tenancy::TenantContext;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/budgets", get(list).post(create))
        .route("/budgets/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub project_id: Option<Uuid>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Budget>> {
    let repo = ScopedRepository::<Budget>::for_context(&state.pool, &context)?;

    let mut conditions = Map::new();
    if let Some(id) = query.project_id {
        conditions.insert("project_id".to_string(), Value::String(id.to_string()));
    }
    let data = FilterData {
        where_clause: (!conditions.is_empty()).then_some(Value::Object(conditions)),
        order: Some(json!([{ "start_date": "desc" }])),
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };

    Ok(ApiResponse::success(repo.select_any(data).await?))
}

async fn create(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Json(body): Json<Value>,
) -> ApiResult<Budget> {
    let repo = ScopedRepository::<Budget>::for_context(&state.pool, &context)?;

    let record = Record::from_api_input(body)?;
    record.validate_required_fields(&["name", "project_id", "period", "start_date", "end_date"])?;
    require_positive_amount(&record, "amount")?;
    record.get_uuid("project_id")?;
    validate_threshold(&record)?;

    let budget = repo.insert(record).await?;
    Ok(ApiResponse::created(budget))
}

async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Budget> {
    let repo = ScopedRepository::<Budget>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.fetch_by_id(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Budget> {
    let repo = ScopedRepository::<Budget>::for_context(&state.pool, &context)?;
    let record = Record::from_api_input(body)?;
    if record.has("amount") {
        require_positive_amount(&record, "amount")?;
    }
    validate_threshold(&record)?;
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

async fn remove(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let repo = ScopedRepository::<Budget>::for_context(&state.pool, &context)?;
    repo.soft_delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// `alert_threshold` is a percentage of the budget amount; only 1..=100
/// makes sense. Absent means the column default (80) applies.
fn validate_threshold(record: &Record) -> Result<(), ApiError> {
    match record.get("alert_threshold") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Number(n)) if n.as_i64().is_some_and(|v| (1..=100).contains(&v)) => Ok(()),
        Some(_) => Err(RecordError::InvalidValue {
            field: "alert_threshold".to_string(),
            reason: "must be a whole number between 1 and 100".to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_bounds() {
        let ok = Record::from_api_input(json!({"alert_threshold": 80})).unwrap();
        assert!(validate_threshold(&ok).is_ok());

        let absent = Record::from_api_input(json!({"name": "Q3"})).unwrap();
        assert!(validate_threshold(&absent).is_ok());

        for bad in [json!({"alert_threshold": 0}), json!({"alert_threshold": 101}), json!({"alert_threshold": "80"})] {
            let record = Record::from_api_input(bad).unwrap();
            assert!(validate_threshold(&record).is_err());
        }
    }
}
