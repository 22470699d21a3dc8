pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod tenancy;

#[cfg(test)]
pub mod testing;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    require_auth_middleware, resolve_tenant_middleware, tenant_guard_middleware,
};
use crate::state::AppState;

/// Assemble the full application router.
///
/// Tenant resolution wraps every route, public ones included, so even a
/// public handler that reaches for the context finds it bound. Protected
/// routes additionally require a valid token and pass the access guard
/// before any handler runs.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(handlers::auth::protected_routes())
        .merge(handlers::tenant::routes())
        .merge(handlers::users::routes())
        .merge(handlers::projects::routes())
        .merge(handlers::accounts::routes())
        .merge(handlers::categories::routes())
        .merge(handlers::expenses::routes())
        .merge(handlers::budgets::routes())
        .merge(handlers::alerts::routes())
        .merge(handlers::reports::routes())
        // Guard order matters: auth validates the token, the tenant guard
        // then checks membership against the resolved tenant.
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tenant_guard_middleware,
        ))
        .layer(axum::middleware::from_fn(require_auth_middleware));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1/auth", handlers::auth::public_routes())
        .nest("/api/v1", protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_tenant_middleware,
        ))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let security = &config::config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
