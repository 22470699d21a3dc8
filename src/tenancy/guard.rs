use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Claims;
use crate::database::models::Role;
use crate::tenancy::context::TenantResolution;
use crate::tenancy::TenancyError;

/// The authenticated actor on a request, as asserted by its token. The
/// guard's database re-check confirms the row still exists and is active;
/// everything else downstream trusts this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl Principal {
    /// Handler-level role gate. Admission only proves membership; endpoints
    /// that need more call this first.
    pub fn require(&self, required: Role) -> Result<(), crate::error::ApiError> {
        if self.role.allows(required) {
            Ok(())
        } else {
            Err(crate::error::ApiError::forbidden(format!(
                "This action requires the {} role",
                required
            )))
        }
    }
}

impl From<&Claims> for Principal {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            tenant_id: claims.tenant_id,
            role: claims.role,
        }
    }
}

/// Terminal admission states for a protected request.
#[derive(Debug)]
pub enum Admission {
    Authorized(Principal),
    Rejected(Rejection),
}

#[derive(Debug)]
pub enum Rejection {
    /// Tenant resolution failed or produced nothing.
    Tenant(TenancyError),
    /// No usable credentials.
    Auth(String),
    /// Credentials are fine but belong to a different tenant.
    Mismatch,
}

/// Pure admission check: tenant first, then credentials, then membership.
///
/// Deliberately free of I/O so the mismatch rejection provably happens
/// before any tenant-scoped query could run. The caller re-verifies the
/// user row afterwards for the authorized case.
pub fn admit(resolution: &TenantResolution, claims: Option<&Claims>) -> Admission {
    let tenant = match resolution {
        TenantResolution::Active(tenant) => tenant,
        TenantResolution::None => {
            return Admission::Rejected(Rejection::Tenant(TenancyError::Required))
        }
    };

    let claims = match claims {
        Some(claims) => claims,
        None => return Admission::Rejected(Rejection::Auth("Authentication required".into())),
    };

    if claims.tenant_id != tenant.id {
        return Admission::Rejected(Rejection::Mismatch);
    }

    Admission::Authorized(Principal::from(claims))
}

impl From<Rejection> for crate::error::ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Tenant(err) => err.into(),
            Rejection::Auth(msg) => crate::error::ApiError::unauthorized(msg),
            Rejection::Mismatch => TenancyError::Mismatch.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::active_tenant_fixture;
    use chrono::Utc;

    fn claims_for(tenant_id: Uuid, role: Role) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "user@example.test".to_string(),
            tenant_id,
            role,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        }
    }

    #[test]
    fn test_authorized_when_tenant_matches() {
        let tenant = active_tenant_fixture("acme");
        let claims = claims_for(tenant.id, Role::Member);
        let admission = admit(&TenantResolution::Active(tenant.clone()), Some(&claims));
        match admission {
            Admission::Authorized(principal) => {
                assert_eq!(principal.tenant_id, tenant.id);
                assert_eq!(principal.role, Role::Member);
            }
            other => panic!("expected authorization, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_mismatch_when_token_is_for_other_tenant() {
        let tenant = active_tenant_fixture("acme");
        let claims = claims_for(Uuid::new_v4(), Role::Owner);
        let admission = admit(&TenantResolution::Active(tenant), Some(&claims));
        assert!(matches!(admission, Admission::Rejected(Rejection::Mismatch)));
    }

    #[test]
    fn test_rejected_tenant_when_unresolved() {
        let claims = claims_for(Uuid::new_v4(), Role::Owner);
        let admission = admit(&TenantResolution::None, Some(&claims));
        assert!(matches!(
            admission,
            Admission::Rejected(Rejection::Tenant(TenancyError::Required))
        ));
    }

    #[test]
    fn test_rejected_auth_when_no_claims() {
        let tenant = active_tenant_fixture("acme");
        let admission = admit(&TenantResolution::Active(tenant), None);
        assert!(matches!(admission, Admission::Rejected(Rejection::Auth(_))));
    }

    #[test]
    fn test_tenant_is_checked_before_credentials() {
        // Missing tenant with missing credentials must report the tenant
        // problem, not the auth problem.
        let admission = admit(&TenantResolution::None, None);
        assert!(matches!(admission, Admission::Rejected(Rejection::Tenant(_))));
    }

    #[test]
    fn test_require_honors_role_ordering() {
        let tenant = active_tenant_fixture("acme");
        let claims = claims_for(tenant.id, Role::Admin);
        let principal = Principal::from(&claims);

        assert!(principal.require(Role::Member).is_ok());
        assert!(principal.require(Role::Admin).is_ok());
        assert!(principal.require(Role::Owner).is_err());
    }
}
