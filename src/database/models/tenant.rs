use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A customer organization. Every tenant-owned row in the database points
/// back at exactly one of these through its `tenant_id` column.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub plan: PlanTier,
    pub max_users: i32,
    pub max_projects: i32,
    pub max_accounts: i32,
    pub max_expenses: i32,
    pub is_active: bool,
    pub suspended_at: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            max_users: self.max_users as i64,
            max_projects: self.max_projects as i64,
            max_accounts: self.max_accounts as i64,
            max_expenses: self.max_expenses as i64,
        }
    }
}

/// Subscription tier. Closed set; pricing logic lives outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Professional,
}

impl PlanTier {
    /// Limits materialized onto the tenant row at provisioning. They can be
    /// raised per-tenant afterwards without a plan change.
    pub fn default_limits(&self) -> PlanLimits {
        match self {
            PlanTier::Basic => PlanLimits {
                max_users: 5,
                max_projects: 10,
                max_accounts: 10,
                max_expenses: 1000,
            },
            PlanTier::Professional => PlanLimits {
                max_users: 50,
                max_projects: 200,
                max_accounts: 100,
                max_expenses: 100_000,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Professional => "professional",
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(PlanTier::Basic),
            "professional" | "pro" => Ok(PlanTier::Professional),
            other => Err(format!("unknown plan tier '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_users: i64,
    pub max_projects: i64,
    pub max_accounts: i64,
    pub max_expenses: i64,
}

/// Custom domain bound to a tenant. Only verified, active rows participate
/// in resolution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantDomain {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub domain: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub verification_token: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
