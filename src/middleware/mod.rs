//! Request pipeline layers.
//!
//! Order is load-bearing: `resolve_tenant` runs on everything and binds the
//! request's [`crate::tenancy::TenantContext`]; protected routes then stack
//! `require_auth` (token validity) and `tenant_guard` (membership plus the
//! user-row re-check) on top.

pub mod auth;
pub mod resolve_tenant;
pub mod response;
pub mod tenant_guard;

pub use auth::require_auth_middleware;
pub use resolve_tenant::resolve_tenant_middleware;
pub use response::{ApiResponse, ApiResult};
pub use tenant_guard::tenant_guard_middleware;
