use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::database::models::{PlanLimits, PlanTier, Tenant};
use crate::tenancy::guard::Principal;
use crate::tenancy::TenancyError;

/// Snapshot of the resolved tenant carried through a request. Cheap to clone
/// and detached from the directory row, so handlers never re-query it.
#[derive(Debug, Clone)]
pub struct ActiveTenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub plan: PlanTier,
    pub limits: PlanLimits,
}

impl From<&Tenant> for ActiveTenant {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name.clone(),
            subdomain: tenant.subdomain.clone(),
            plan: tenant.plan,
            limits: tenant.limits(),
        }
    }
}

/// What the resolver concluded for this request.
#[derive(Debug, Clone)]
pub enum TenantResolution {
    /// No tenant source was present. Public routes proceed; scoped queries
    /// fail closed.
    None,
    Active(ActiveTenant),
}

/// Per-request tenancy state. Constructed fresh by the resolver middleware
/// for every request and carried in the request extensions; never shared
/// between requests.
///
/// Both slots are write-once. Misuse panics: a panic here means middleware
/// wiring is broken, not that a client sent something wrong.
#[derive(Clone, Default)]
pub struct TenantContext {
    inner: Arc<ContextInner>,
}

#[derive(Default)]
struct ContextInner {
    resolution: OnceLock<TenantResolution>,
    principal: OnceLock<Principal>,
}

impl TenantContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resolver outcome. Exactly once per request.
    pub fn bind(&self, resolution: TenantResolution) {
        if self.inner.resolution.set(resolution).is_err() {
            panic!("tenant context bound twice; the resolver must run exactly once per request");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inner.resolution.get().is_some()
    }

    /// The raw resolution. Panics if the resolver has not run.
    pub fn resolution(&self) -> &TenantResolution {
        self.inner
            .resolution
            .get()
            .expect("tenant context read before resolution; is the resolver middleware installed?")
    }

    /// The resolved tenant, or TenancyError::Required when the request has
    /// none. Panics if the resolver has not run.
    pub fn tenant(&self) -> Result<&ActiveTenant, TenancyError> {
        match self.resolution() {
            TenantResolution::Active(tenant) => Ok(tenant),
            TenantResolution::None => Err(TenancyError::Required),
        }
    }

    /// The resolved tenant if any. Panics if the resolver has not run.
    pub fn maybe_tenant(&self) -> Option<&ActiveTenant> {
        match self.resolution() {
            TenantResolution::Active(tenant) => Some(tenant),
            TenantResolution::None => None,
        }
    }

    pub fn tenant_id(&self) -> Result<Uuid, TenancyError> {
        self.tenant().map(|t| t.id)
    }

    /// Record the admitted principal. Exactly once, by the access guard.
    pub fn bind_principal(&self, principal: Principal) {
        if self.inner.principal.set(principal).is_err() {
            panic!("principal bound twice; the access guard must run exactly once per request");
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.inner.principal.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;

    fn active(name: &str) -> TenantResolution {
        TenantResolution::Active(ActiveTenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subdomain: name.to_string(),
            plan: PlanTier::Basic,
            limits: PlanTier::Basic.default_limits(),
        })
    }

    #[test]
    fn test_bound_context_returns_tenant() {
        let ctx = TenantContext::new();
        ctx.bind(active("acme"));
        assert_eq!(ctx.tenant().unwrap().subdomain, "acme");
        assert!(ctx.tenant_id().is_ok());
    }

    #[test]
    fn test_empty_resolution_fails_closed() {
        let ctx = TenantContext::new();
        ctx.bind(TenantResolution::None);
        assert!(matches!(ctx.tenant(), Err(TenancyError::Required)));
        assert!(ctx.maybe_tenant().is_none());
    }

    #[test]
    #[should_panic(expected = "read before resolution")]
    fn test_read_before_bind_panics() {
        let ctx = TenantContext::new();
        let _ = ctx.tenant();
    }

    #[test]
    #[should_panic(expected = "bound twice")]
    fn test_double_bind_panics() {
        let ctx = TenantContext::new();
        ctx.bind(TenantResolution::None);
        ctx.bind(active("acme"));
    }

    #[test]
    #[should_panic(expected = "principal bound twice")]
    fn test_double_principal_panics() {
        let ctx = TenantContext::new();
        ctx.bind(active("acme"));
        let tenant_id = ctx.tenant_id().unwrap();
        let principal = Principal {
            user_id: Uuid::new_v4(),
            email: "a@acme.test".into(),
            tenant_id,
            role: Role::Member,
        };
        ctx.bind_principal(principal.clone());
        ctx.bind_principal(principal);
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = TenantContext::new();
        let clone = ctx.clone();
        ctx.bind(active("acme"));
        assert_eq!(clone.tenant().unwrap().subdomain, "acme");
    }
}
