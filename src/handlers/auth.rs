use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::password::verify_password;
use crate::auth::{generate_jwt, Claims};
use crate::database::models::{PlanTier, User};
use crate::database::{Record, ScopedRepository};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{record_audit_event, TenantService};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub company_name: String,
    #[serde(default)]
    pub plan: Option<PlanTier>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// POST /api/v1/auth/register - provision a tenant and its owner.
///
/// The one tenant-less write path in the API: there is no tenant to resolve
/// yet, so provisioning runs through the tenant service (and its audited
/// bypass) rather than a request-scoped repository.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Value> {
    if body.company_name.trim().is_empty() {
        return Err(ApiError::bad_request("company_name is required"));
    }
    if body.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    if !body.email.contains('@') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }

    let service = TenantService::new(state.pool.clone(), state.directory.clone());
    let plan = body.plan.unwrap_or(PlanTier::Basic);
    let tenant = service
        .provision(&body.company_name, plan, body.email.trim())
        .await?;
    let owner = service
        .create_owner(
            &tenant,
            &body.email,
            &body.password,
            &body.first_name,
            &body.last_name,
            body.email.trim(),
        )
        .await?;

    let token = generate_jwt(&Claims::for_user(&owner))?;

    Ok(ApiResponse::created(json!({
        "tenant": tenant,
        "user": owner,
        "token": token,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/login - authenticate within the resolved tenant.
///
/// Requires tenant resolution: the same email may exist under many tenants,
/// and the credential check must never search across them.
async fn login(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Value> {
    let tenant_id = context.tenant_id()?;
    let users = ScopedRepository::<User>::for_context(&state.pool, &context)?;

    let user = users
        .select_one(crate::filter::FilterData {
            where_clause: Some(json!({ "email": body.email.trim().to_lowercase() })),
            ..Default::default()
        })
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }
    if !verify_password(&body.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let mut touch = Record::new();
    touch.set("last_login_at", chrono::Utc::now().to_rfc3339());
    let user = users.update_by_id(user.id, touch).await?;

    record_audit_event(
        &state.pool,
        &user.email,
        "login",
        "user",
        Some(&user.id.to_string()),
        Some(tenant_id),
        None,
        json!({}),
    )
    .await?;

    let claims = Claims::for_user(&user);
    let token = generate_jwt(&claims)?;

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": user,
        "expires_in": claims.exp - claims.iat,
    })))
}

/// GET /api/v1/auth/me - the authenticated principal's user row.
async fn me(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<User> {
    let users = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    let user = users.fetch_by_id(principal.user_id).await?;
    Ok(ApiResponse::success(user))
}
