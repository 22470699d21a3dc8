use chrono::Utc;
use uuid::Uuid;

use crate::database::models::{PlanTier, Role, Tenant, User};
use crate::tenancy::{ActiveTenant, Principal};

/// In-memory fixtures shared by unit tests. Integration tests build their
/// own through `StaticDirectory`.
pub fn tenant_fixture(subdomain: &str, active: bool) -> Tenant {
    let limits = PlanTier::Basic.default_limits();
    Tenant {
        id: Uuid::new_v4(),
        name: subdomain.to_string(),
        subdomain: subdomain.to_string(),
        plan: PlanTier::Basic,
        max_users: limits.max_users as i32,
        max_projects: limits.max_projects as i32,
        max_accounts: limits.max_accounts as i32,
        max_expenses: limits.max_expenses as i32,
        is_active: active,
        suspended_at: if active { None } else { Some(Utc::now()) },
        suspension_reason: if active { None } else { Some("test suspension".to_string()) },
        settings: serde_json::json!({}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        deleted_at: None,
    }
}

pub fn active_tenant_fixture(subdomain: &str) -> ActiveTenant {
    ActiveTenant::from(&tenant_fixture(subdomain, true))
}

pub fn principal_fixture(tenant_id: Uuid, role: Role) -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        email: "user@example.test".to_string(),
        tenant_id,
        role,
    }
}

pub fn user_fixture(tenant_id: Uuid, email: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        tenant_id,
        email: email.to_string(),
        password_hash: String::new(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role,
        is_active: true,
        last_login_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        deleted_at: None,
    }
}
