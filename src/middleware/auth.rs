use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::{validate_jwt, Claims};
use crate::error::ApiError;

/// Requires a valid bearer token and stashes its [`Claims`] in the request
/// extensions. This layer is purely about the token; whether the token's
/// tenant matches the request's tenant is the access guard's job.
pub async fn require_auth_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let claims = validate_jwt(&token)
        .map_err(|err| ApiError::unauthorized(format!("Invalid token: {}", err)))?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
