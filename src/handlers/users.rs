use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::database::models::{Role, User};
use crate::database::{Record, ScopedRepository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::handlers::enforce_plan_limit;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::tenancy::{Principal, TenantContext};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list).post(create))
        .route("/users/:id", get(show).patch(update))
        .route("/users/:id/role", patch(change_role))
        .route("/users/:id/deactivate", post(deactivate))
}

async fn list(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> ApiResult<Vec<User>> {
    let repo = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    let data = FilterData { order: Some(json!([{ "email": "asc" }])), ..Default::default() };
    Ok(ApiResponse::success(repo.select_any(data).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// POST /api/v1/users - invite a user into the current tenant. Admin and
/// up; granting the owner role is reserved to owners.
async fn create(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<User> {
    principal.require(Role::Admin)?;
    let role = body.role.unwrap_or(Role::Member);
    if role == Role::Owner {
        principal.require(Role::Owner)?;
    }
    if body.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    if !body.email.contains('@') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }

    let repo = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    enforce_plan_limit(&repo, context.tenant()?.limits.max_users, "users").await?;

    let mut record = Record::new();
    record
        .set("email", body.email.trim().to_lowercase())
        .set("password_hash", hash_password(&body.password)?)
        .set("first_name", body.first_name.trim())
        .set("last_name", body.last_name.trim())
        .set("role", role.as_str())
        .set("is_active", true);

    let user = repo.insert(record).await?;
    Ok(ApiResponse::created(user))
}

async fn show(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    let repo = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.fetch_by_id(id).await?))
}

/// PATCH /api/v1/users/:id - profile fields only. Self-service, or admin
/// for anyone in the tenant. Role and activation have dedicated endpoints.
async fn update(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<User> {
    if id != principal.user_id {
        principal.require(Role::Admin)?;
    }

    let mut record = Record::from_api_input(body)?;
    for managed in ["role", "is_active", "email", "password_hash"] {
        if record.remove(managed).is_some() {
            return Err(ApiError::bad_request(format!(
                "Field '{}' cannot be changed through this endpoint",
                managed
            )));
        }
    }

    let repo = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// PATCH /api/v1/users/:id/role - admin and up; the owner role can only be
/// granted by an owner.
async fn change_role(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChangeRoleRequest>,
) -> ApiResult<User> {
    principal.require(Role::Admin)?;
    if body.role == Role::Owner {
        principal.require(Role::Owner)?;
    }

    let repo = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    let mut record = Record::new();
    record.set("role", body.role.as_str());
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}

/// POST /api/v1/users/:id/deactivate - admin and up. Deactivation, not
/// deletion: the user's expense history stays attributable.
async fn deactivate(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    principal.require(Role::Admin)?;
    if id == principal.user_id {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    let repo = ScopedRepository::<User>::for_context(&state.pool, &context)?;
    let mut record = Record::new();
    record.set("is_active", false);
    Ok(ApiResponse::success(repo.update_by_id(id, record).await?))
}
