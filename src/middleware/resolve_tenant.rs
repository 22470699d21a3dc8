use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::middleware::Next;
use axum::response::Response;

use crate::config::config;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::{ActiveTenant, TenantContext, TenantResolution};

/// Resolves the request's tenant and binds a fresh [`TenantContext`] into
/// the request extensions.
///
/// Runs on every route, public ones included: a request with no tenant
/// source still gets a context bound to [`TenantResolution::None`], so any
/// scoped query reached from it fails closed instead of guessing. Failures
/// (ghost subdomain, suspended tenant, directory outage) end the request
/// here; handlers never see a half-resolved tenant.
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let header = request
        .headers()
        .get(config().tenancy.tenant_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let resolution = match state
        .resolver
        .resolve(host.as_deref(), header.as_deref())
        .await?
    {
        Some(resolved) => TenantResolution::Active(ActiveTenant::from(&resolved.tenant)),
        None => TenantResolution::None,
    };

    let context = TenantContext::new();
    context.bind(resolution);
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
