//! Enrichment pipeline integration tests
//!
//! These tests drive `Enricher` end to end from configuration, the way the
//! `enrich` subcommand and the middleware use it.

use std::net::IpAddr;
use std::sync::Arc;
use std::thread;

use vantage::geo::{AnonymizationLevel, Confidence, GeoSource, GeoVendor};
use vantage::headers::ProxyVendor;
use vantage::routes::{PerformanceRecorder, RouteCategory, SuspiciousCategory};
use vantage::{parse_all, Config, Enricher, RequestMetadata};

fn metadata(json: &str) -> RequestMetadata {
    serde_json::from_str(json).unwrap()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[test]
fn test_cloudflare_request_end_to_end() {
    let enricher = Enricher::from_config(&Config::default()).unwrap();
    let record = enricher.enrich(&metadata(
        r#"{
            "headers": {
                "CF-Connecting-IP": "81.2.69.160",
                "CF-IPCountry": "GB",
                "CF-IPCity": "London",
                "CF-Ray": "8f1e2d3c4b5a6978-LHR",
                "CF-Visitor": "{\"scheme\":\"https\"}",
                "X-Forwarded-For": "81.2.69.160, 172.70.1.1",
                "User-Agent": "Mozilla/5.0"
            },
            "remote_addr": "172.70.1.1",
            "path": "/api/orders/12345?expand=items"
        }"#,
    ));

    let real_ip = record.real_ip.unwrap();
    assert_eq!(real_ip.addr(), ip("81.2.69.0"));
    assert_eq!(real_ip.level(), AnonymizationLevel::Partial);

    assert_eq!(record.proxy_vendor, ProxyVendor::Cloudflare);
    assert!(record.headers_consistent);
    assert_eq!(record.connection.protocol, "https");

    assert_eq!(record.geo.source, GeoSource::ProxyHeader(GeoVendor::Cloudflare));
    assert_eq!(record.geo.confidence, Confidence::High);
    assert_eq!(record.geo.city.as_deref(), Some("London"));
    assert_eq!(record.geo.timezone.as_deref(), Some("Europe/London"));

    assert!(record.route.trackable);
    assert_eq!(record.route.pattern, "/api/orders/:id");
    assert_eq!(record.route.category, RouteCategory::Api);
    assert!(record.route.suspicious_categories.is_empty());
}

#[test]
fn test_direct_request_uses_remote_addr() {
    let enricher = Enricher::from_config(&Config::default()).unwrap();
    let record = enricher.enrich(&metadata(r#"{"remote_addr": "8.8.8.8", "path": "/"}"#));

    assert_eq!(record.proxy_vendor, ProxyVendor::Direct);
    assert_eq!(record.real_ip.unwrap().addr(), ip("8.8.8.0"));
    assert_eq!(record.geo.source, GeoSource::IpGeolocation);
    assert_eq!(record.geo.country_code.unwrap().as_str(), "US");
    assert_eq!(record.route.pattern, "/");
}

#[test]
fn test_spoofed_chain_flagged_with_allow_list() {
    let mut config = Config::default();
    config.headers.trusted_proxies = vec!["cloudflare".to_string()];
    let enricher = Enricher::from_config(&config).unwrap();

    let record = enricher.enrich(&metadata(
        r#"{"headers": {"x-forwarded-for": "203.0.113.5, 198.51.100.99"}, "path": "/wp-admin/"}"#,
    ));

    assert!(!record.headers_consistent);
    assert!(record.header_issue.unwrap().contains("198.51.100.99"));
    assert!(record
        .route
        .suspicious_categories
        .contains(&SuspiciousCategory::SecurityScan));
}

#[test]
fn test_record_serialization_shape() {
    let mut config = Config::default();
    config.geo.ip_anonymization = AnonymizationLevel::Full;
    let enricher = Enricher::from_config(&config).unwrap();

    let record = enricher.enrich(&metadata(
        r#"{"headers": [["x-real-ip", "203.0.113.77"]], "path": "/users/42", "duration_ms": 87}"#,
    ));
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["real_ip"]["addr"], "203.0.0.0");
    assert_eq!(json["real_ip"]["level"], "full");
    assert_eq!(json["proxy_vendor"], "nginx");
    assert_eq!(json["route"]["category"], "user");
    assert_eq!(json["duration_ms"], 87);
    assert!(json.get("header_issue").is_none());
    assert!(json["recorded_at"].is_string());
}

#[test]
fn test_parse_all_defaults() {
    let headers = [("x-forwarded-for", "1.1.1.1"), ("x-forwarded-proto", "https")]
        .into_iter()
        .collect();

    let parsed = parse_all(&headers, Some(ip("10.0.0.1")));
    assert_eq!(parsed.real_ip, Some(ip("1.1.1.1")));
    assert_eq!(parsed.proxy_type, ProxyVendor::AwsAlb);
    assert_eq!(parsed.geo.country_code.unwrap().as_str(), "AU");
    assert!(parsed.headers_valid);
}

#[test]
fn test_concurrent_enrichment_with_recorder() {
    let recorder = Arc::new(PerformanceRecorder::new(
        Config::default().routes.compile().unwrap().performance,
    ));
    let enricher = Arc::new(
        Enricher::from_config(&Config::default())
            .unwrap()
            .with_recorder(Arc::clone(&recorder)),
    );

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let enricher = Arc::clone(&enricher);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let request = RequestMetadata {
                        path: format!("/orders/{}", worker * 1000 + i),
                        duration_ms: Some(10 + i),
                        ..RequestMetadata::default()
                    };
                    enricher.enrich(&request);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let report = recorder.report();
    assert_eq!(recorder.sample_count(), 2000);
    assert_eq!(report.total_patterns, 1);

    let stats = &report.performance_groups["/orders/:id"];
    assert_eq!(stats.count, 2000);
    assert_eq!(stats.min, 10);
    assert_eq!(stats.max, 259);
}
