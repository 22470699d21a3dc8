use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, PasswordError};
use crate::database::models::{PlanTier, Role, Tenant, TenantDomain, User};
use crate::database::{CrossTenantAccess, Record, ScopeError, ScopedRepository};
use crate::services::audit::record_audit_event;
use crate::tenancy::TenantDirectory;

#[derive(Debug, thiserror::Error)]
pub enum TenantServiceError {
    #[error("Tenant not found")]
    NotFound,
    #[error("Domain '{0}' is already bound to a tenant")]
    DomainTaken(String),
    #[error("Verification token does not match")]
    VerificationFailed,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Tenant lifecycle: provisioning, suspension, domain binding.
///
/// Every mutation here invalidates the directory cache for the tenant it
/// touched, so the resolver sees the change on its next lookup rather than
/// one TTL later.
pub struct TenantService {
    pool: PgPool,
    directory: Arc<dyn TenantDirectory>,
}

impl TenantService {
    pub fn new(pool: PgPool, directory: Arc<dyn TenantDirectory>) -> Self {
        Self { pool, directory }
    }

    /// Create a tenant with a unique subdomain derived from its display name
    /// and the plan's limits materialized onto the row.
    pub async fn provision(
        &self,
        name: &str,
        plan: PlanTier,
        actor: &str,
    ) -> Result<Tenant, TenantServiceError> {
        let subdomain = self.generate_unique_subdomain(name).await?;
        let limits = plan.default_limits();
        let now = Utc::now();

        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO \"tenants\" \
             (\"id\", \"name\", \"subdomain\", \"plan\", \"max_users\", \"max_projects\", \
              \"max_accounts\", \"max_expenses\", \"is_active\", \"settings\", \
              \"created_at\", \"updated_at\", \"is_deleted\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9, $10, $10, false) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name.trim())
        .bind(&subdomain)
        .bind(plan)
        .bind(limits.max_users as i32)
        .bind(limits.max_projects as i32)
        .bind(limits.max_accounts as i32)
        .bind(limits.max_expenses as i32)
        .bind(json!({}))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        record_audit_event(
            &self.pool,
            actor,
            "tenant_provisioned",
            "tenant",
            Some(&tenant.id.to_string()),
            Some(tenant.id),
            None,
            json!({ "subdomain": tenant.subdomain, "plan": plan.as_str() }),
        )
        .await?;

        info!(tenant = %tenant.subdomain, plan = plan.as_str(), "tenant provisioned");
        Ok(tenant)
    }

    /// Create the first user of a freshly provisioned tenant. Runs outside
    /// any request context, so it goes through the audited bypass.
    pub async fn create_owner(
        &self,
        tenant: &Tenant,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        actor: &str,
    ) -> Result<User, TenantServiceError> {
        let access =
            CrossTenantAccess::enter(&self.pool, tenant.id, actor, "tenant provisioning").await?;
        let users: ScopedRepository<User> = access.repository();

        let mut record = Record::new();
        record
            .set("email", email.trim().to_lowercase())
            .set("password_hash", hash_password(password)?)
            .set("first_name", first_name.trim())
            .set("last_name", last_name.trim())
            .set("role", Role::Owner.as_str())
            .set("is_active", true);

        Ok(users.insert(record).await?)
    }

    pub async fn suspend(
        &self,
        tenant_id: Uuid,
        reason: &str,
        actor: &str,
    ) -> Result<Tenant, TenantServiceError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE \"tenants\" SET \"is_active\" = false, \"suspended_at\" = $1, \
             \"suspension_reason\" = $2, \"updated_at\" = $1 \
             WHERE \"id\" = $3 AND \"is_deleted\" = false RETURNING *",
        )
        .bind(Utc::now())
        .bind(reason)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TenantServiceError::NotFound)?;

        self.directory.invalidate(tenant_id).await;
        record_audit_event(
            &self.pool,
            actor,
            "tenant_suspended",
            "tenant",
            Some(&tenant_id.to_string()),
            Some(tenant_id),
            Some(reason),
            json!({}),
        )
        .await?;

        info!(tenant = %tenant.subdomain, reason, "tenant suspended");
        Ok(tenant)
    }

    pub async fn restore(&self, tenant_id: Uuid, actor: &str) -> Result<Tenant, TenantServiceError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE \"tenants\" SET \"is_active\" = true, \"suspended_at\" = NULL, \
             \"suspension_reason\" = NULL, \"updated_at\" = $1 \
             WHERE \"id\" = $2 AND \"is_deleted\" = false RETURNING *",
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TenantServiceError::NotFound)?;

        self.directory.invalidate(tenant_id).await;
        record_audit_event(
            &self.pool,
            actor,
            "tenant_restored",
            "tenant",
            Some(&tenant_id.to_string()),
            Some(tenant_id),
            None,
            json!({}),
        )
        .await?;

        info!(tenant = %tenant.subdomain, "tenant restored");
        Ok(tenant)
    }

    /// Update the tenant profile (display name, settings). The subdomain is
    /// immutable: changing it would orphan every inbound link and bookmark.
    pub async fn update_profile(
        &self,
        tenant_id: Uuid,
        name: Option<&str>,
        settings: Option<Value>,
    ) -> Result<Tenant, TenantServiceError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE \"tenants\" SET \
             \"name\" = COALESCE($1, \"name\"), \
             \"settings\" = COALESCE($2, \"settings\"), \
             \"updated_at\" = $3 \
             WHERE \"id\" = $4 AND \"is_deleted\" = false RETURNING *",
        )
        .bind(name.map(str::trim))
        .bind(settings)
        .bind(Utc::now())
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TenantServiceError::NotFound)?;

        self.directory.invalidate(tenant_id).await;
        Ok(tenant)
    }

    /// Bind a custom domain to a tenant. The binding starts unverified and
    /// does not participate in resolution until [`Self::verify_domain`].
    pub async fn bind_domain(
        &self,
        tenant_id: Uuid,
        domain: &str,
    ) -> Result<TenantDomain, TenantServiceError> {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM \"tenant_domains\" WHERE \"domain\" = $1)",
        )
        .bind(&domain)
        .fetch_one(&self.pool)
        .await?;
        if taken {
            return Err(TenantServiceError::DomainTaken(domain));
        }

        let binding = sqlx::query_as::<_, TenantDomain>(
            "INSERT INTO \"tenant_domains\" \
             (\"id\", \"tenant_id\", \"domain\", \"is_verified\", \"is_active\", \
              \"verification_token\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, false, true, $4, $5, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&domain)
        .bind(verification_token(tenant_id, &domain))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(tenant_id = %tenant_id, domain = %binding.domain, "custom domain bound");
        Ok(binding)
    }

    /// Mark a domain binding verified once the caller proves control of the
    /// domain by presenting the token back (typically via a DNS TXT record).
    pub async fn verify_domain(
        &self,
        tenant_id: Uuid,
        domain_id: Uuid,
        token: &str,
    ) -> Result<TenantDomain, TenantServiceError> {
        let binding = sqlx::query_as::<_, TenantDomain>(
            "SELECT * FROM \"tenant_domains\" WHERE \"id\" = $1 AND \"tenant_id\" = $2",
        )
        .bind(domain_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TenantServiceError::NotFound)?;

        if binding.verification_token != token {
            return Err(TenantServiceError::VerificationFailed);
        }

        let binding = sqlx::query_as::<_, TenantDomain>(
            "UPDATE \"tenant_domains\" SET \"is_verified\" = true, \"verified_at\" = $1, \
             \"updated_at\" = $1 WHERE \"id\" = $2 RETURNING *",
        )
        .bind(Utc::now())
        .bind(domain_id)
        .fetch_one(&self.pool)
        .await?;

        self.directory.invalidate(tenant_id).await;
        info!(tenant_id = %tenant_id, domain = %binding.domain, "custom domain verified");
        Ok(binding)
    }

    /// Derive a unique subdomain from a display name: slugify, then append a
    /// numeric suffix on collision, then fall back to a random hex suffix.
    pub async fn generate_unique_subdomain(
        &self,
        name: &str,
    ) -> Result<String, TenantServiceError> {
        let base = slugify(name);
        let mut candidate = base.clone();
        let mut suffix = 1u32;

        while self.subdomain_taken(&candidate).await? {
            if suffix > 20 {
                candidate = with_suffix(&base, &random_hex(4));
                break;
            }
            candidate = with_suffix(&base, &suffix.to_string());
            suffix += 1;
        }

        Ok(candidate)
    }

    async fn subdomain_taken(&self, slug: &str) -> Result<bool, TenantServiceError> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM \"tenants\" WHERE \"subdomain\" = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(taken)
    }
}

const MAX_SLUG_LEN: usize = 63;

/// Reduce a display name to a DNS-label-safe slug. Never empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = true;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "tenant" } else { slug };
    slug.chars().take(MAX_SLUG_LEN).collect::<String>().trim_matches('-').to_string()
}

fn with_suffix(base: &str, suffix: &str) -> String {
    let budget = MAX_SLUG_LEN - suffix.len() - 1;
    let trimmed = base.chars().take(budget).collect::<String>();
    format!("{}-{}", trimmed.trim_matches('-'), suffix)
}

fn random_hex(len: usize) -> String {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect::<String>()[..len].to_string()
}

fn verification_token(tenant_id: Uuid, domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(domain.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    format!("tally-verify-{:x}", hasher.finalize())[..40].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basics() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Wayne & Sons, Ltd.  "), "wayne-sons-ltd");
        assert_eq!(slugify("ACME"), "acme");
        assert_eq!(slugify("héllo wörld"), "h-llo-w-rld");
    }

    #[test]
    fn test_slugify_never_empty() {
        assert_eq!(slugify(""), "tenant");
        assert_eq!(slugify("!!!"), "tenant");
    }

    #[test]
    fn test_slugify_caps_length() {
        let long = "a".repeat(100);
        assert_eq!(slugify(&long).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_suffix_respects_length_cap() {
        let base = "b".repeat(MAX_SLUG_LEN);
        let candidate = with_suffix(&base, "17");
        assert!(candidate.len() <= MAX_SLUG_LEN);
        assert!(candidate.ends_with("-17"));
    }

    #[test]
    fn test_random_hex_shape() {
        let hex = random_hex(4);
        assert_eq!(hex.len(), 4);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verification_tokens_are_unique_per_call() {
        let id = Uuid::new_v4();
        let a = verification_token(id, "expenses.acme.com");
        let b = verification_token(id, "expenses.acme.com");
        assert_ne!(a, b);
        assert!(a.starts_with("tally-verify-"));
    }
}
