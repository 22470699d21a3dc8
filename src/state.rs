use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::config;
use crate::tenancy::{CachedDirectory, PgTenantDirectory, TenantDirectory, TenantResolver};

/// Shared application state handed to every router layer and handler.
///
/// Cloning is cheap: the pool is an `Arc` internally and everything else is
/// behind one. The directory is kept alongside the resolver because
/// provisioning paths need to invalidate it directly.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub directory: Arc<dyn TenantDirectory>,
    pub resolver: Arc<TenantResolver>,
}

impl AppState {
    pub fn new(pool: PgPool, directory: Arc<dyn TenantDirectory>) -> Self {
        let resolver = Arc::new(TenantResolver::new(directory.clone(), &config().tenancy));
        Self { pool, directory, resolver }
    }

    /// Production wiring: Postgres-backed directory behind the configured
    /// TTL cache. A zero TTL keeps the cache layer out entirely.
    pub fn for_pool(pool: PgPool) -> Self {
        let ttl = config().tenancy.cache_ttl_secs;
        let directory: Arc<dyn TenantDirectory> = if ttl == 0 {
            Arc::new(PgTenantDirectory::new(pool.clone()))
        } else {
            Arc::new(CachedDirectory::new(
                PgTenantDirectory::new(pool.clone()),
                Duration::from_secs(ttl),
            ))
        };
        Self::new(pool, directory)
    }
}
