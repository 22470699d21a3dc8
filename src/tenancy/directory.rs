use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::Tenant;

/// Errors from tenant directory lookups
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("tenant lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

/// Durable source of tenant records and domain bindings.
///
/// Lookups return suspended tenants too; deciding what suspension means is
/// the resolver's job. Only hard-deleted rows are invisible here.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_by_subdomain(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError>;
    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError>;
    async fn tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>, DirectoryError>;

    /// Drop any cached entries for a tenant. A no-op for directories that
    /// read straight from the source of truth.
    async fn invalidate(&self, _tenant_id: Uuid) {}
}

/// Directory backed by the shared Postgres database.
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn tenant_by_subdomain(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"SELECT * FROM "tenants" WHERE "subdomain" = $1 AND "is_deleted" = false"#,
        )
        .bind(slug.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"SELECT * FROM "tenants" WHERE "id" = $1 AND "is_deleted" = false"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>, DirectoryError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"SELECT t.* FROM "tenants" t
               JOIN "tenant_domains" d ON d."tenant_id" = t."id"
               WHERE d."domain" = $1
                 AND d."is_verified" = true
                 AND d."is_active" = true
                 AND t."is_deleted" = false"#,
        )
        .bind(host.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }
}

#[derive(Clone)]
struct CacheEntry {
    tenant: Tenant,
    cached_at: Instant,
}

impl CacheEntry {
    fn fresh(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// TTL cache in front of another directory. Positive hits only: caching a
/// miss would hide a freshly provisioned tenant for a whole TTL, while a
/// stale-active tenant is bounded by it.
pub struct CachedDirectory<D> {
    inner: D,
    ttl: Duration,
    by_slug: Arc<RwLock<HashMap<String, CacheEntry>>>,
    by_id: Arc<RwLock<HashMap<Uuid, CacheEntry>>>,
    by_domain: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl<D: TenantDirectory> CachedDirectory<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            by_slug: Arc::new(RwLock::new(HashMap::new())),
            by_id: Arc::new(RwLock::new(HashMap::new())),
            by_domain: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn store(&self, tenant: &Tenant, domain_key: Option<&str>) {
        let entry = CacheEntry { tenant: tenant.clone(), cached_at: Instant::now() };
        self.by_slug
            .write()
            .await
            .insert(tenant.subdomain.clone(), entry.clone());
        self.by_id.write().await.insert(tenant.id, entry.clone());
        if let Some(domain) = domain_key {
            self.by_domain.write().await.insert(domain.to_string(), entry);
        }
    }
}

#[async_trait]
impl<D: TenantDirectory> TenantDirectory for CachedDirectory<D> {
    async fn tenant_by_subdomain(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError> {
        let key = slug.to_lowercase();

        // Fast path: try read lock
        {
            let cache = self.by_slug.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fresh(self.ttl) {
                    return Ok(Some(entry.tenant.clone()));
                }
            }
        }

        let tenant = self.inner.tenant_by_subdomain(&key).await?;
        if let Some(ref tenant) = tenant {
            self.store(tenant, None).await;
        }
        Ok(tenant)
    }

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        {
            let cache = self.by_id.read().await;
            if let Some(entry) = cache.get(&id) {
                if entry.fresh(self.ttl) {
                    return Ok(Some(entry.tenant.clone()));
                }
            }
        }

        let tenant = self.inner.tenant_by_id(id).await?;
        if let Some(ref tenant) = tenant {
            self.store(tenant, None).await;
        }
        Ok(tenant)
    }

    async fn tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>, DirectoryError> {
        let key = host.to_lowercase();

        {
            let cache = self.by_domain.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fresh(self.ttl) {
                    return Ok(Some(entry.tenant.clone()));
                }
            }
        }

        let tenant = self.inner.tenant_by_domain(&key).await?;
        if let Some(ref tenant) = tenant {
            self.store(tenant, Some(&key)).await;
        }
        Ok(tenant)
    }

    /// Drops every cached entry for the tenant. Call after any tenant
    /// mutation (suspension, plan change, domain binding).
    async fn invalidate(&self, tenant_id: Uuid) {
        self.by_id.write().await.remove(&tenant_id);
        self.by_slug
            .write()
            .await
            .retain(|_, entry| entry.tenant.id != tenant_id);
        self.by_domain
            .write()
            .await
            .retain(|_, entry| entry.tenant.id != tenant_id);
        debug!(tenant_id = %tenant_id, "tenant cache invalidated");
    }
}

/// Fixed in-memory directory for tests, seed previews, and local tooling.
#[derive(Default)]
pub struct StaticDirectory {
    tenants: Vec<Tenant>,
    domains: Vec<(String, Uuid)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: Tenant) -> Self {
        self.tenants.push(tenant);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>, tenant_id: Uuid) -> Self {
        self.domains.push((domain.into().to_lowercase(), tenant_id));
        self
    }
}

#[async_trait]
impl TenantDirectory for StaticDirectory {
    async fn tenant_by_subdomain(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError> {
        let slug = slug.to_lowercase();
        Ok(self
            .tenants
            .iter()
            .find(|t| t.subdomain == slug && !t.is_deleted)
            .cloned())
    }

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.tenants.iter().find(|t| t.id == id && !t.is_deleted).cloned())
    }

    async fn tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>, DirectoryError> {
        let host = host.to_lowercase();
        let Some((_, tenant_id)) = self.domains.iter().find(|(d, _)| *d == host) else {
            return Ok(None);
        };
        self.tenant_by_id(*tenant_id).await
    }
}

#[async_trait]
impl<D: TenantDirectory + ?Sized> TenantDirectory for Arc<D> {
    async fn tenant_by_subdomain(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError> {
        (**self).tenant_by_subdomain(slug).await
    }

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DirectoryError> {
        (**self).tenant_by_id(id).await
    }

    async fn tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>, DirectoryError> {
        (**self).tenant_by_domain(host).await
    }

    async fn invalidate(&self, tenant_id: Uuid) {
        (**self).invalidate(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tenant_fixture as tenant;

    #[tokio::test]
    async fn test_static_directory_lookups_are_case_insensitive() {
        let acme = tenant("acme", true);
        let id = acme.id;
        let dir = StaticDirectory::new()
            .with_tenant(acme)
            .with_domain("expenses.acme.com", id);

        assert!(dir.tenant_by_subdomain("ACME").await.unwrap().is_some());
        assert!(dir.tenant_by_domain("EXPENSES.ACME.COM").await.unwrap().is_some());
        assert!(dir.tenant_by_subdomain("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_serves_within_ttl_and_invalidates() {
        let acme = tenant("acme", true);
        let id = acme.id;
        let dir = CachedDirectory::new(
            StaticDirectory::new().with_tenant(acme),
            Duration::from_secs(60),
        );

        let first = dir.tenant_by_subdomain("acme").await.unwrap().unwrap();
        assert_eq!(first.id, id);
        // Served from cache now; invalidation must punch through.
        assert!(dir.by_slug.read().await.contains_key("acme"));
        dir.invalidate(id).await;
        assert!(!dir.by_slug.read().await.contains_key("acme"));
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let acme = tenant("acme", true);
        let dir =
            CachedDirectory::new(StaticDirectory::new().with_tenant(acme), Duration::ZERO);

        dir.tenant_by_subdomain("acme").await.unwrap();
        // Zero TTL: entry is stored but never considered fresh.
        let cache = dir.by_slug.read().await;
        assert!(!cache.get("acme").unwrap().fresh(dir.ttl));
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let dir = CachedDirectory::new(StaticDirectory::new(), Duration::from_secs(60));
        assert!(dir.tenant_by_subdomain("ghost").await.unwrap().is_none());
        assert!(dir.by_slug.read().await.is_empty());
    }
}
