use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::Claims;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::{admit, Admission, Principal, TenantContext};

/// Admits or rejects the request before any tenant data is touched.
///
/// [`admit`] settles tenant, credentials, and membership on the claims
/// alone, so a token minted for another tenant is turned away without a
/// single query. Only admitted requests pay for the user-row re-check,
/// which catches accounts deactivated or deleted after the token was
/// issued. The row's role wins over the token's: tokens outlive demotions.
pub async fn tenant_guard_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("tenant context missing from request"))?;
    let claims = request.extensions().get::<Claims>().cloned();

    let principal = match admit(context.resolution(), claims.as_ref()) {
        Admission::Authorized(principal) => principal,
        Admission::Rejected(rejection) => return Err(rejection.into()),
    };

    let user = sqlx::query_as::<_, User>(
        r#"SELECT * FROM "users" WHERE "id" = $1 AND "tenant_id" = $2 AND "is_deleted" = false"#,
    )
    .bind(principal.user_id)
    .bind(principal.tenant_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let principal = Principal { role: user.role, ..principal };

    context.bind_principal(principal.clone());
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
