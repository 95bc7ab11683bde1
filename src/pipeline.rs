//! Per-request composition of header trust, geo resolution and route
//! classification into a single enrichment record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::geo::{
    extract_geographic_data, AnonymizedIp, CachedGeoResolver, GeoOptions, GeoResult,
    RequestContext,
};
use crate::headers::{
    detect_proxy_type, extract_connection_info, extract_real_ip, validate_headers,
    ConnectionInfo, HeaderSet, ProxyVendor, TrustedProxies,
};
use crate::routes::{PerformanceRecorder, RouteClassifier, RouteDecision};

/// Everything derivable from the headers of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRequest {
    /// Raw client address; anonymize before persisting
    pub real_ip: Option<IpAddr>,
    pub geo: GeoResult,
    pub connection: ConnectionInfo,
    pub proxy_type: ProxyVendor,
    pub headers_valid: bool,
}

/// Parse headers with default geo options and no hop allow-list
pub fn parse_all(headers: &HeaderSet, remote_addr: Option<IpAddr>) -> ParsedRequest {
    let real_ip = extract_real_ip(headers, remote_addr);
    let context = RequestContext::new(headers).with_client_ip(real_ip);

    ParsedRequest {
        real_ip,
        geo: extract_geographic_data(&context, &GeoOptions::default()),
        connection: extract_connection_info(headers),
        proxy_type: detect_proxy_type(headers),
        headers_valid: validate_headers(headers, None).is_ok(),
    }
}

/// Raw request metadata handed over by the serving layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default)]
    pub headers: HeaderSet,
    #[serde(default)]
    pub remote_addr: Option<IpAddr>,
    pub path: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Enrichment output, ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentRecord {
    pub recorded_at: DateTime<Utc>,
    pub real_ip: Option<AnonymizedIp>,
    pub proxy_vendor: ProxyVendor,
    pub headers_consistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_issue: Option<String>,
    pub connection: ConnectionInfo,
    pub geo: GeoResult,
    pub route: RouteDecision,
    pub duration_ms: Option<u64>,
}

/// Configured enrichment pipeline, shareable across request handlers
#[derive(Clone)]
pub struct Enricher {
    geo: CachedGeoResolver,
    routes: RouteClassifier,
    trusted: Option<TrustedProxies>,
    recorder: Option<Arc<PerformanceRecorder>>,
}

impl Enricher {
    pub fn new(geo: CachedGeoResolver, routes: RouteClassifier) -> Self {
        Self {
            geo,
            routes,
            trusted: None,
            recorder: None,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let routes = RouteClassifier::new(config.routes.compile()?);
        let enricher = Self::new(config.geo.resolver()?, routes)
            .with_trusted_proxies(config.headers.trusted()?);
        Ok(enricher)
    }

    /// Require forwarded hops to come from these networks
    pub fn with_trusted_proxies(mut self, trusted: Option<TrustedProxies>) -> Self {
        self.trusted = trusted;
        self
    }

    /// Feed durations of trackable requests into a recorder
    pub fn with_recorder(mut self, recorder: Arc<PerformanceRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn recorder(&self) -> Option<&Arc<PerformanceRecorder>> {
        self.recorder.as_ref()
    }

    pub fn routes(&self) -> &RouteClassifier {
        &self.routes
    }

    pub fn enrich(&self, request: &RequestMetadata) -> EnrichmentRecord {
        let headers = &request.headers;
        let real_ip = extract_real_ip(headers, request.remote_addr);

        let header_issue = match validate_headers(headers, self.trusted.as_ref()) {
            Ok(()) => None,
            Err(e) => {
                debug!(path = %request.path, error = %e, "request headers failed validation");
                Some(e.to_string())
            }
        };

        let context = RequestContext::new(headers).with_client_ip(real_ip);
        let geo = self.geo.resolve(&context);
        let route = self.routes.decide(&request.path);

        if let (Some(recorder), Some(duration), true) =
            (&self.recorder, request.duration_ms, route.trackable)
        {
            recorder.record(&request.path, duration);
        }

        EnrichmentRecord {
            recorded_at: Utc::now(),
            real_ip: real_ip.map(|ip| self.geo.resolver().anonymize(ip)),
            proxy_vendor: detect_proxy_type(headers),
            headers_consistent: header_issue.is_none(),
            header_issue,
            connection: extract_connection_info(headers),
            geo,
            route,
            duration_ms: request.duration_ms,
        }
    }
}
