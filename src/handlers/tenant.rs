use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantService;
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenant", get(show).patch(update))
        .route("/tenant/domains", post(bind_domain))
        .route("/tenant/domains/:id/verify", post(verify_domain))
}

/// GET /api/v1/tenant - the current tenant's profile.
async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> ApiResult<Value> {
    let tenant_id = context.tenant_id()?;
    let tenant = state
        .directory
        .tenant_by_id(tenant_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;
    Ok(ApiResponse::success(json!(tenant)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub settings: Option<Value>,
}

/// PATCH /api/v1/tenant - owner-only profile update. The subdomain is not
/// editable here or anywhere else.
async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<UpdateTenantRequest>,
) -> ApiResult<Value> {
    principal.require(Role::Owner)?;

    let service = TenantService::new(state.pool.clone(), state.directory.clone());
    let tenant = service
        .update_profile(context.tenant_id()?, body.name.as_deref(), body.settings)
        .await?;
    Ok(ApiResponse::success(json!(tenant)))
}

#[derive(Debug, Deserialize)]
pub struct BindDomainRequest {
    pub domain: String,
}

/// POST /api/v1/tenant/domains - attach a custom domain. Returns the
/// verification token the owner must publish before the domain resolves.
async fn bind_domain(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<BindDomainRequest>,
) -> ApiResult<Value> {
    principal.require(Role::Owner)?;
    if body.domain.trim().is_empty() || !body.domain.contains('.') {
        return Err(ApiError::bad_request("A fully qualified domain is required"));
    }

    let service = TenantService::new(state.pool.clone(), state.directory.clone());
    let binding = service.bind_domain(context.tenant_id()?, &body.domain).await?;
    Ok(ApiResponse::created(json!(binding)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyDomainRequest {
    pub token: String,
}

/// POST /api/v1/tenant/domains/:id/verify - complete domain verification.
async fn verify_domain(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(domain_id): Path<Uuid>,
    Json(body): Json<VerifyDomainRequest>,
) -> ApiResult<Value> {
    principal.require(Role::Owner)?;

    let service = TenantService::new(state.pool.clone(), state.directory.clone());
    let binding = service
        .verify_domain(context.tenant_id()?, domain_id, body.token.trim())
        .await?;
    Ok(ApiResponse::success(json!(binding)))
}
