use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TenancyConfig;
use crate::database::models::Tenant;
use crate::tenancy::directory::TenantDirectory;
use crate::tenancy::TenancyError;

/// Where the winning tenant identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Subdomain,
    Header,
    CustomDomain,
}

#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    pub source: ResolutionSource,
}

/// Derives the current tenant from a request. Precedence: subdomain, then
/// explicit header, then custom-domain binding. Pure lookup; resolving the
/// same request twice gives the same answer and writes nothing.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    base_domain: String,
    dev_hosts: Vec<String>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, config: &TenancyConfig) -> Self {
        Self {
            directory,
            // Ports never participate in matching.
            base_domain: strip_port(&config.base_domain).to_lowercase(),
            dev_hosts: config.dev_hosts.iter().map(|h| h.to_lowercase()).collect(),
        }
    }

    /// Extract the candidate slug from a Host header, if the host names one.
    ///
    /// `acme.tally.app` yields `acme`; the bare base domain, `www.`, hosts
    /// outside the base domain, and configured dev hosts yield nothing.
    pub fn subdomain_candidate(&self, host: &str) -> Option<String> {
        let host = strip_port(host).to_lowercase();

        if host.is_empty() || host == self.base_domain || self.dev_hosts.contains(&host) {
            return None;
        }

        let suffix = format!(".{}", self.base_domain);
        let prefix = match host.strip_suffix(&suffix) {
            Some(prefix) => prefix,
            // acme.localhost works without editing the base domain in dev.
            None => self
                .dev_hosts
                .iter()
                .find_map(|dev| host.strip_suffix(&format!(".{}", dev)))?,
        };

        let label = prefix.split('.').next().unwrap_or("");
        if label.is_empty() || label == "www" {
            return None;
        }
        Some(label.to_string())
    }

    /// Resolve the tenant for a request. `Ok(None)` means no tenant source
    /// was present at all; whether that is an error depends on the route.
    pub async fn resolve(
        &self,
        host: Option<&str>,
        header_value: Option<&str>,
    ) -> Result<Option<ResolvedTenant>, TenancyError> {
        // Remember the first explicit name the client used, so a dead-end
        // resolution can say "that tenant does not exist" instead of
        // pretending nothing was asked for.
        let mut named: Option<String> = None;

        let candidate = host.and_then(|h| self.subdomain_candidate(h));
        if let Some(slug) = candidate {
            named = Some(slug.clone());
            if let Some(tenant) = self.directory.tenant_by_subdomain(&slug).await? {
                ensure_active(&tenant)?;
                self.flag_header_conflict(&tenant, header_value);
                debug!(tenant = %tenant.subdomain, "tenant resolved from subdomain");
                return Ok(Some(ResolvedTenant { tenant, source: ResolutionSource::Subdomain }));
            }
        }

        if let Some(raw) = header_value {
            let raw = raw.trim();
            if !raw.is_empty() {
                named.get_or_insert_with(|| raw.to_string());
                if let Ok(id) = Uuid::parse_str(raw) {
                    if let Some(tenant) = self.directory.tenant_by_id(id).await? {
                        ensure_active(&tenant)?;
                        debug!(tenant = %tenant.subdomain, "tenant resolved from header");
                        return Ok(Some(ResolvedTenant {
                            tenant,
                            source: ResolutionSource::Header,
                        }));
                    }
                }
            }
        }

        if let Some(host) = host {
            let host = strip_port(host).to_lowercase();
            if let Some(tenant) = self.directory.tenant_by_domain(&host).await? {
                ensure_active(&tenant)?;
                debug!(tenant = %tenant.subdomain, domain = %host, "tenant resolved from custom domain");
                return Ok(Some(ResolvedTenant { tenant, source: ResolutionSource::CustomDomain }));
            }
        }

        match named {
            Some(name) => Err(TenancyError::NotFound(name)),
            None => Ok(None),
        }
    }

    /// Subdomain wins over a disagreeing header, but the disagreement is
    /// suspicious enough to record.
    fn flag_header_conflict(&self, resolved: &Tenant, header_value: Option<&str>) {
        let Some(raw) = header_value else { return };
        let Ok(header_id) = Uuid::parse_str(raw.trim()) else { return };
        if header_id != resolved.id {
            warn!(
                subdomain_tenant = %resolved.id,
                header_tenant = %header_id,
                "tenant header disagrees with subdomain; subdomain wins"
            );
        }
    }
}

fn ensure_active(tenant: &Tenant) -> Result<(), TenancyError> {
    if tenant.is_active {
        Ok(())
    } else {
        Err(TenancyError::Inactive(tenant.subdomain.clone()))
    }
}

fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::StaticDirectory;
    use crate::testing::tenant_fixture;

    fn resolver(directory: StaticDirectory) -> TenantResolver {
        let config = TenancyConfig {
            base_domain: "tally.test".to_string(),
            tenant_header: "X-Tenant-Id".to_string(),
            cache_ttl_secs: 0,
            dev_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        };
        TenantResolver::new(Arc::new(directory), &config)
    }

    #[test]
    fn test_subdomain_candidate_extraction() {
        let r = resolver(StaticDirectory::new());
        assert_eq!(r.subdomain_candidate("acme.tally.test"), Some("acme".to_string()));
        assert_eq!(r.subdomain_candidate("ACME.tally.test:8080"), Some("acme".to_string()));
        assert_eq!(r.subdomain_candidate("acme.localhost:3000"), Some("acme".to_string()));
        assert_eq!(r.subdomain_candidate("tally.test"), None);
        assert_eq!(r.subdomain_candidate("www.tally.test"), None);
        assert_eq!(r.subdomain_candidate("localhost:8080"), None);
        assert_eq!(r.subdomain_candidate("expenses.acme.com"), None);
    }

    #[tokio::test]
    async fn test_resolves_from_subdomain() {
        let acme = tenant_fixture("acme", true);
        let r = resolver(StaticDirectory::new().with_tenant(acme));

        let resolved = r.resolve(Some("acme.tally.test"), None).await.unwrap().unwrap();
        assert_eq!(resolved.tenant.subdomain, "acme");
        assert_eq!(resolved.source, ResolutionSource::Subdomain);
    }

    #[tokio::test]
    async fn test_resolves_from_header_when_no_subdomain() {
        let acme = tenant_fixture("acme", true);
        let id = acme.id;
        let r = resolver(StaticDirectory::new().with_tenant(acme));

        let resolved = r
            .resolve(Some("tally.test"), Some(&id.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.source, ResolutionSource::Header);
        assert_eq!(resolved.tenant.id, id);
    }

    #[tokio::test]
    async fn test_subdomain_wins_over_disagreeing_header() {
        let acme = tenant_fixture("acme", true);
        let globex = tenant_fixture("globex", true);
        let globex_id = globex.id;
        let r = resolver(StaticDirectory::new().with_tenant(acme).with_tenant(globex));

        let resolved = r
            .resolve(Some("acme.tally.test"), Some(&globex_id.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.tenant.subdomain, "acme");
        assert_eq!(resolved.source, ResolutionSource::Subdomain);
    }

    #[tokio::test]
    async fn test_resolves_from_custom_domain() {
        let acme = tenant_fixture("acme", true);
        let id = acme.id;
        let r = resolver(
            StaticDirectory::new()
                .with_tenant(acme)
                .with_domain("expenses.acme.com", id),
        );

        let resolved = r
            .resolve(Some("expenses.acme.com:443"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.source, ResolutionSource::CustomDomain);
    }

    #[tokio::test]
    async fn test_unknown_subdomain_is_not_found() {
        let r = resolver(StaticDirectory::new());
        let err = r.resolve(Some("ghost.tally.test"), None).await.unwrap_err();
        assert!(matches!(err, TenancyError::NotFound(slug) if slug == "ghost"));
    }

    #[tokio::test]
    async fn test_no_source_resolves_to_none() {
        let r = resolver(StaticDirectory::new());
        assert!(r.resolve(Some("tally.test"), None).await.unwrap().is_none());
        assert!(r.resolve(None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_suspended_tenant_is_inactive_not_missing() {
        let frozen = tenant_fixture("frozen", false);
        let id = frozen.id;
        let r = resolver(StaticDirectory::new().with_tenant(frozen));

        let err = r.resolve(Some("frozen.tally.test"), None).await.unwrap_err();
        assert!(matches!(err, TenancyError::Inactive(_)));

        // Same outcome through the header path.
        let err = r.resolve(None, Some(&id.to_string())).await.unwrap_err();
        assert!(matches!(err, TenancyError::Inactive(_)));
    }

    #[tokio::test]
    async fn test_header_rescues_unknown_subdomain() {
        let acme = tenant_fixture("acme", true);
        let id = acme.id;
        let r = resolver(StaticDirectory::new().with_tenant(acme));

        let resolved = r
            .resolve(Some("ghost.tally.test"), Some(&id.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.source, ResolutionSource::Header);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let acme = tenant_fixture("acme", true);
        let r = resolver(StaticDirectory::new().with_tenant(acme));

        let first = r.resolve(Some("acme.tally.test"), None).await.unwrap().unwrap();
        let second = r.resolve(Some("acme.tally.test"), None).await.unwrap().unwrap();
        assert_eq!(first.tenant.id, second.tenant.id);
        assert_eq!(first.source, second.source);
    }
}
