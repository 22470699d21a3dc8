use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::report_service::{CategoryTotal, ProjectSummary, ReportService};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/project/:id/summary", get(project_summary))
        .route("/reports/category-breakdown", get(category_breakdown))
}

/// GET /api/v1/reports/project/:id/summary - totals and budget utilization.
/// Analyst and up; members see raw expenses but not the rollups.
async fn project_summary(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProjectSummary> {
    principal.require(Role::Analyst)?;

    let reports = ReportService::for_context(&state.pool, &context)?;
    let summary = reports.project_summary(id).await.map_err(ApiError::from)?;
    Ok(ApiResponse::success(summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct BreakdownQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// GET /api/v1/reports/category-breakdown - per-category spend totals.
async fn category_breakdown(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<BreakdownQuery>,
) -> ApiResult<Vec<CategoryTotal>> {
    principal.require(Role::Analyst)?;

    let reports = ReportService::for_context(&state.pool, &context)?;
    let rows = reports
        .category_breakdown(query.date_from, query.date_to)
        .await
        .map_err(ApiError::from)?;
    Ok(ApiResponse::success(rows))
}
