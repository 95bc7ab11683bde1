use moka::sync::Cache;
use std::time::Duration;

use super::resolver::{GeoResolver, RequestContext};
use super::{AnonymizedIp, GeoResult};

/// Geo resolver with a TTL cache in front of the IP geolocator
///
/// Entries are keyed by the anonymized address, so every client inside the
/// same anonymization bucket shares one entry. Header-derived locations are
/// request-specific and never cached.
#[derive(Clone)]
pub struct CachedGeoResolver {
    inner: GeoResolver,
    ip_cache: Cache<AnonymizedIp, Option<GeoResult>>,
}

impl CachedGeoResolver {
    pub fn new(inner: GeoResolver, max_entries: u64, ttl: Duration) -> Self {
        let ip_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, ip_cache }
    }

    pub fn resolver(&self) -> &GeoResolver {
        &self.inner
    }

    pub fn resolve(&self, context: &RequestContext<'_>) -> GeoResult {
        let raw = self.inner.from_proxy_headers(context.headers).or_else(|| {
            let ip = self.inner.anonymize(context.resolved_ip()?);
            self.ip_cache.get_with(ip, || self.inner.from_ip(&ip))
        });

        self.inner.finish(raw)
    }

    /// Number of cached lookups, including cached misses
    pub fn entry_count(&self) -> u64 {
        self.ip_cache.run_pending_tasks();
        self.ip_cache.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.ip_cache.invalidate_all();
    }
}
