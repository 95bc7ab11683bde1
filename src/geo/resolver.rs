//! Best-effort geographic resolution
//!
//! Resolution never fails: proxy headers are tried first, then an IP lookup
//! on the anonymized address, and finally an unknown low-confidence result.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use super::enrich::enrich;
use super::lookup::{BuiltinGeolocator, IpGeolocator};
use super::proxy_headers::extract_vendor_geo;
use super::{AnonymizationLevel, AnonymizedIp, GeoResult, GeoVendor};
use crate::headers::{extract_real_ip, HeaderSet};

/// Runtime options for geographic resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoOptions {
    pub ip_anonymization: AnonymizationLevel,
    pub country_only: bool,
    pub trust_proxy_headers: bool,
    /// Vendor names whose geo headers are believed
    pub trusted_proxies: Vec<String>,
}

impl Default for GeoOptions {
    fn default() -> Self {
        Self {
            ip_anonymization: AnonymizationLevel::Partial,
            country_only: false,
            trust_proxy_headers: true,
            trusted_proxies: vec![
                "cloudflare".to_string(),
                "cloudfront".to_string(),
                "fastly".to_string(),
            ],
        }
    }
}

impl GeoOptions {
    fn trusts(&self, vendor: GeoVendor) -> bool {
        match vendor.trust_name() {
            Some(name) => self
                .trusted_proxies
                .iter()
                .any(|t| t.eq_ignore_ascii_case(name)),
            None => true,
        }
    }
}

/// Per-request input to the resolver
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub headers: &'a HeaderSet,
    /// Client address, already resolved by the caller; when absent it is
    /// derived from the headers and `remote_addr`
    pub client_ip: Option<IpAddr>,
    pub remote_addr: Option<IpAddr>,
}

impl<'a> RequestContext<'a> {
    pub fn new(headers: &'a HeaderSet) -> Self {
        Self {
            headers,
            client_ip: None,
            remote_addr: None,
        }
    }

    pub fn with_client_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.client_ip = ip;
        self
    }

    pub fn with_remote_addr(mut self, addr: Option<IpAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Explicit client address, else the header-derived one
    pub fn resolved_ip(&self) -> Option<IpAddr> {
        self.client_ip
            .or_else(|| extract_real_ip(self.headers, self.remote_addr))
    }
}

/// Geographic resolver with a pluggable IP geolocator
#[derive(Clone)]
pub struct GeoResolver {
    options: GeoOptions,
    geolocator: Arc<dyn IpGeolocator>,
}

impl GeoResolver {
    /// Resolver backed by the builtin static table
    pub fn new(options: GeoOptions) -> Self {
        Self::with_geolocator(options, Arc::new(BuiltinGeolocator))
    }

    pub fn with_geolocator(options: GeoOptions, geolocator: Arc<dyn IpGeolocator>) -> Self {
        Self {
            options,
            geolocator,
        }
    }

    pub fn options(&self) -> &GeoOptions {
        &self.options
    }

    /// Anonymize an address at the configured level
    pub fn anonymize(&self, ip: IpAddr) -> AnonymizedIp {
        AnonymizedIp::new(ip, self.options.ip_anonymization)
    }

    /// Location from trusted vendor headers, before enrichment
    pub fn from_proxy_headers(&self, headers: &HeaderSet) -> Option<GeoResult> {
        if !self.options.trust_proxy_headers || headers.is_empty() {
            return None;
        }

        GeoVendor::PRIORITY
            .into_iter()
            .filter(|vendor| self.options.trusts(*vendor))
            .find_map(|vendor| extract_vendor_geo(vendor, headers))
    }

    /// Location from the IP geolocator, before enrichment
    pub fn from_ip(&self, ip: &AnonymizedIp) -> Option<GeoResult> {
        self.geolocator.lookup(ip)
    }

    /// Enrich a raw result, or produce the unknown default
    pub fn finish(&self, raw: Option<GeoResult>) -> GeoResult {
        match raw {
            Some(result) => enrich(result, self.options.country_only),
            None => {
                debug!("no geo data available, using unknown location");
                GeoResult::default()
            }
        }
    }

    /// Resolve a location for one request
    pub fn resolve(&self, context: &RequestContext<'_>) -> GeoResult {
        let raw = self.from_proxy_headers(context.headers).or_else(|| {
            let ip = self.anonymize(context.resolved_ip()?);
            self.from_ip(&ip)
        });

        self.finish(raw)
    }
}

/// Resolve a location with the builtin geolocator
pub fn extract_geographic_data(context: &RequestContext<'_>, options: &GeoOptions) -> GeoResult {
    GeoResolver::new(options.clone()).resolve(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Confidence, GeoSource};
    use std::sync::Mutex;

    fn headers(pairs: &[(&str, &str)]) -> HeaderSet {
        pairs.iter().copied().collect()
    }

    /// Records every address it is asked about
    #[derive(Default)]
    struct RecordingGeolocator {
        seen: Mutex<Vec<IpAddr>>,
    }

    impl IpGeolocator for RecordingGeolocator {
        fn lookup(&self, ip: &AnonymizedIp) -> Option<GeoResult> {
            self.seen.lock().unwrap().push(ip.addr());
            None
        }
    }

    #[test]
    fn test_vendor_priority() {
        let h = headers(&[
            ("x-country-code", "FR"),
            ("cloudfront-viewer-country", "DE"),
            ("cf-ipcountry", "US"),
        ]);

        let geo = extract_geographic_data(&RequestContext::new(&h), &GeoOptions::default());
        assert_eq!(geo.country_code.unwrap().as_str(), "US");
        assert_eq!(geo.source, GeoSource::ProxyHeader(GeoVendor::Cloudflare));
    }

    #[test]
    fn test_untrusted_vendor_is_skipped() {
        let h = headers(&[("cf-ipcountry", "US"), ("cloudfront-viewer-country", "DE")]);
        let options = GeoOptions {
            trusted_proxies: vec!["cloudfront".to_string()],
            ..GeoOptions::default()
        };

        let geo = extract_geographic_data(&RequestContext::new(&h), &options);
        assert_eq!(geo.country_code.unwrap().as_str(), "DE");
    }

    #[test]
    fn test_proxy_trust_disabled_uses_ip_lookup() {
        let h = headers(&[("cf-ipcountry", "US"), ("cf-connecting-ip", "81.2.69.160")]);
        let options = GeoOptions {
            trust_proxy_headers: false,
            ..GeoOptions::default()
        };

        let geo = extract_geographic_data(&RequestContext::new(&h), &options);
        assert_eq!(geo.country_code.unwrap().as_str(), "GB");
        assert_eq!(geo.source, GeoSource::IpGeolocation);
        assert_eq!(geo.confidence, Confidence::Low);
        assert_eq!(geo.timezone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn test_nothing_resolves_to_default() {
        let h = HeaderSet::new();
        let geo = extract_geographic_data(&RequestContext::new(&h), &GeoOptions::default());
        assert_eq!(geo, GeoResult::default());

        let ctx = RequestContext::new(&h).with_remote_addr(Some("10.1.2.3".parse().unwrap()));
        let geo = extract_geographic_data(&ctx, &GeoOptions::default());
        assert!(geo.is_unknown());
        assert_eq!(geo.confidence, Confidence::Low);
    }

    #[test]
    fn test_lookup_only_sees_anonymized_address() {
        let recorder = Arc::new(RecordingGeolocator::default());
        let options = GeoOptions {
            ip_anonymization: AnonymizationLevel::Full,
            ..GeoOptions::default()
        };
        let resolver = GeoResolver::with_geolocator(options, recorder.clone());

        let h = headers(&[("x-real-ip", "203.0.113.77")]);
        resolver.resolve(&RequestContext::new(&h));

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &["203.0.0.0".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_country_only_strips_detail() {
        let h = headers(&[("cf-ipcountry", "US"), ("cf-ipcity", "Seattle")]);
        let options = GeoOptions {
            country_only: true,
            ..GeoOptions::default()
        };

        let geo = extract_geographic_data(&RequestContext::new(&h), &options);
        assert_eq!(geo.city, None);
        assert_eq!(geo.country_name.as_deref(), Some("United States"));
        assert_eq!(geo.timezone.as_deref(), Some("America/Los_Angeles"));
    }
}
