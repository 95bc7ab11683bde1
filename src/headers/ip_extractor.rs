//! Client IP extraction, proxy vendor detection and header validation
//!
//! This module implements client IP extraction that:
//! - Walks a fixed precedence of vendor and de-facto standard headers
//! - Skips candidates that are not valid IPv4/IPv6 addresses
//! - Falls back to the transport remote address
//! - Flags header sets that look spoofed or self-contradictory

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::debug;

use super::{HeaderSet, HeaderValidationError, TrustedProxies, X_FORWARDED_FOR};

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const TRUE_CLIENT_IP: &str = "true-client-ip";
const X_REAL_IP: &str = "x-real-ip";
const X_CLIENT_IP: &str = "x-client-ip";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_SSL: &str = "x-forwarded-ssl";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PORT: &str = "x-forwarded-port";
const CF_RAY: &str = "cf-ray";
const CF_VISITOR: &str = "cf-visitor";

const CLOUDFLARE_HEADERS: &[&str] = &[
    CF_RAY,
    CF_CONNECTING_IP,
    "cf-ipcountry",
    CF_VISITOR,
    "cf-ipcity",
    "cf-worker",
];

const CLOUDFRONT_HEADERS: &[&str] = &[
    "cloudfront-viewer-address",
    "cloudfront-viewer-country",
    "cloudfront-forwarded-proto",
    "cloudfront-is-desktop-viewer",
    "cloudfront-is-mobile-viewer",
    "x-amz-cf-id",
];

/// The intermediary that most likely produced the request headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyVendor {
    Cloudflare,
    AwsCloudfront,
    AwsAlb,
    Nginx,
    GenericProxy,
    Direct,
}

/// URL scheme derived from the connection headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

/// Connection details reported by the proxy chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Protocol name as reported, lowercased (`http`, `https`, `wss`, ...)
    pub protocol: String,
    pub scheme: Scheme,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

/// Outcome of trust resolution for a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResolution {
    pub real_ip: Option<IpAddr>,
    pub proxy_vendor: ProxyVendor,
    pub headers_consistent: bool,
}

/// Extract the most credible client IP address
///
/// # Arguments
/// * `headers` - Request headers
/// * `fallback` - The transport remote address, if known
///
/// # Returns
/// The first valid address in precedence order, or `None` when no tier
/// yields one
pub fn extract_real_ip(headers: &HeaderSet, fallback: Option<IpAddr>) -> Option<IpAddr> {
    let first_forwarded = headers.forwarded_chain().first().copied();

    let candidates = [
        (CF_CONNECTING_IP, headers.get(CF_CONNECTING_IP)),
        (TRUE_CLIENT_IP, headers.get(TRUE_CLIENT_IP)),
        (X_REAL_IP, headers.get(X_REAL_IP)),
        (X_FORWARDED_FOR, first_forwarded),
        (X_CLIENT_IP, headers.get(X_CLIENT_IP)),
    ];

    for (source, candidate) in candidates {
        let Some(raw) = candidate else {
            continue;
        };
        match parse_ip(raw) {
            Some(ip) => return Some(ip),
            None => debug!(header = source, value = raw, "skipping invalid client IP candidate"),
        }
    }

    fallback
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok()
}

/// Identify the proxy or CDN vendor from header signatures
pub fn detect_proxy_type(headers: &HeaderSet) -> ProxyVendor {
    if headers.contains_any(CLOUDFLARE_HEADERS) {
        ProxyVendor::Cloudflare
    } else if headers.contains_any(CLOUDFRONT_HEADERS) {
        ProxyVendor::AwsCloudfront
    } else if headers.contains(X_FORWARDED_FOR) && headers.contains(X_FORWARDED_PROTO) {
        ProxyVendor::AwsAlb
    } else if headers.contains(X_REAL_IP) {
        ProxyVendor::Nginx
    } else if headers.contains(X_FORWARDED_FOR) {
        ProxyVendor::GenericProxy
    } else {
        ProxyVendor::Direct
    }
}

/// Check the header set for spoofing signals
///
/// Validation never modifies the request; it only classifies trust. When
/// `trusted` is given, every `x-forwarded-for` hop after the client entry must
/// fall inside the allow-list.
pub fn validate_headers(
    headers: &HeaderSet,
    trusted: Option<&TrustedProxies>,
) -> Result<(), HeaderValidationError> {
    if let Some(ray) = headers.get(CF_RAY) {
        if !is_valid_cf_ray(ray) {
            return Err(HeaderValidationError::InvalidCfHeaders(format!(
                "malformed cf-ray '{ray}'"
            )));
        }
    }

    if let Some(trusted) = trusted {
        for hop in headers.forwarded_chain().into_iter().skip(1) {
            let is_trusted = parse_ip(hop).is_some_and(|ip| trusted.contains(ip));
            if !is_trusted {
                return Err(HeaderValidationError::UntrustedForwardedHeaders {
                    hop: hop.to_string(),
                });
            }
        }
    }

    check_protocol_consistency(headers)
}

/// Cloudflare Ray IDs look like `8f1e2d3c4b5a6978-SJC`
fn is_valid_cf_ray(ray: &str) -> bool {
    let Some((id, colo)) = ray.split_once('-') else {
        return false;
    };

    id.len() == 16
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && colo.len() == 3
        && colo.bytes().all(|b| b.is_ascii_uppercase())
}

fn check_protocol_consistency(headers: &HeaderSet) -> Result<(), HeaderValidationError> {
    let forwarded_proto = headers.get_non_empty(X_FORWARDED_PROTO).map(first_proto);
    let forwarded_ssl = headers
        .get_non_empty(X_FORWARDED_SSL)
        .map(|v| v.to_ascii_lowercase());

    if let (Some(proto), Some(ssl)) = (&forwarded_proto, &forwarded_ssl) {
        let conflict = match ssl.as_str() {
            "on" => proto == "http",
            "off" => proto == "https",
            _ => false,
        };
        if conflict {
            return Err(HeaderValidationError::InconsistentHeaders(format!(
                "x-forwarded-proto is '{proto}' but x-forwarded-ssl is '{ssl}'"
            )));
        }
    }

    if let (Some(proto), Some(visitor)) = (&forwarded_proto, cf_visitor_scheme(headers)) {
        if is_web_scheme(proto) && *proto != visitor {
            return Err(HeaderValidationError::InconsistentHeaders(format!(
                "x-forwarded-proto is '{proto}' but cf-visitor scheme is '{visitor}'"
            )));
        }
    }

    Ok(())
}

fn is_web_scheme(proto: &str) -> bool {
    matches!(proto, "http" | "https")
}

/// First protocol of a possibly comma-separated `x-forwarded-proto`, lowercased
fn first_proto(value: &str) -> String {
    value
        .split(',')
        .next()
        .unwrap_or(value)
        .trim()
        .to_ascii_lowercase()
}

#[derive(Deserialize)]
struct CfVisitor {
    scheme: String,
}

/// Scheme embedded in Cloudflare's `cf-visitor: {"scheme":"https"}` header
///
/// Malformed JSON is treated as absent.
fn cf_visitor_scheme(headers: &HeaderSet) -> Option<String> {
    let raw = headers.get_non_empty(CF_VISITOR)?;
    match serde_json::from_str::<CfVisitor>(raw) {
        Ok(visitor) => Some(visitor.scheme.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()),
        Err(e) => {
            debug!(error = %e, "ignoring malformed cf-visitor header");
            None
        }
    }
}

/// Derive protocol, scheme, host, port and user agent from the headers
pub fn extract_connection_info(headers: &HeaderSet) -> ConnectionInfo {
    let mut protocol = String::from("http");

    if let Some(proto) = headers.get_non_empty(X_FORWARDED_PROTO) {
        protocol = first_proto(proto);
    }
    if headers
        .get(X_FORWARDED_SSL)
        .is_some_and(|v| v.eq_ignore_ascii_case("on"))
    {
        protocol = String::from("https");
    }
    if let Some(scheme) = cf_visitor_scheme(headers) {
        protocol = scheme;
    }

    let scheme = match protocol.as_str() {
        "https" | "wss" => Scheme::Https,
        _ => Scheme::Http,
    };

    let raw_host = headers
        .get_non_empty(X_FORWARDED_HOST)
        .or_else(|| headers.get_non_empty("host"))
        .map(|h| h.split(',').next().unwrap_or(h).trim());
    let (host, host_port) = match raw_host {
        Some(h) => split_host_port(h),
        None => (None, None),
    };

    let port = headers
        .get_non_empty(X_FORWARDED_PORT)
        .and_then(|p| p.trim().parse::<u16>().ok())
        .or(host_port);

    ConnectionInfo {
        protocol,
        scheme,
        port,
        host,
        user_agent: headers.get_non_empty("user-agent").map(str::to_string),
    }
}

/// Split `example.com:8443` or `[::1]:8080` into host and port
fn split_host_port(raw: &str) -> (Option<String>, Option<u16>) {
    if let Some(rest) = raw.strip_prefix('[') {
        if let Some((host, after)) = rest.split_once(']') {
            let port = after.strip_prefix(':').and_then(|p| p.parse().ok());
            return (Some(host.to_string()), port);
        }
    }

    match raw.rsplit_once(':') {
        // A bare IPv6 address has several colons and no port
        Some((host, port)) if !host.contains(':') => {
            (Some(host.to_string()), port.parse().ok())
        }
        _ => (Some(raw.to_string()), None),
    }
}

/// Resolve the client address, vendor and header consistency in one pass
pub fn resolve_proxy(
    headers: &HeaderSet,
    fallback: Option<IpAddr>,
    trusted: Option<&TrustedProxies>,
) -> ProxyResolution {
    ProxyResolution {
        real_ip: extract_real_ip(headers, fallback),
        proxy_vendor: detect_proxy_type(headers),
        headers_consistent: validate_headers(headers, trusted).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_extract_real_ip_prefers_cf_connecting_ip() {
        let h = headers(&[
            ("x-forwarded-for", "198.51.100.1"),
            ("x-real-ip", "198.51.100.2"),
            ("CF-Connecting-IP", "203.0.113.1"),
        ]);

        assert_eq!(extract_real_ip(&h, None), Some("203.0.113.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_real_ip_first_forwarded_entry() {
        let h = headers(&[("x-forwarded-for", "203.0.113.195, 198.51.100.1, 192.0.2.1")]);
        assert_eq!(extract_real_ip(&h, None), Some("203.0.113.195".parse().unwrap()));
    }

    #[test]
    fn test_extract_real_ip_skips_empty_forwarded_entries() {
        let h = headers(&[
            ("x-forwarded-for", ""),
            ("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
        ]);
        let remote = Some("192.0.2.200".parse().unwrap());

        assert_eq!(extract_real_ip(&h, remote), Some("203.0.113.9".parse().unwrap()));

        let h = headers(&[("x-forwarded-for", " , 198.51.100.7")]);
        assert_eq!(extract_real_ip(&h, remote), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn test_extract_real_ip_skips_invalid_candidates() {
        let h = headers(&[
            ("cf-connecting-ip", "not-an-ip"),
            ("true-client-ip", "999.1.1.1"),
            ("x-client-ip", "2001:db8::5"),
        ]);

        assert_eq!(extract_real_ip(&h, None), Some("2001:db8::5".parse().unwrap()));
    }

    #[test]
    fn test_extract_real_ip_falls_back_to_remote_address() {
        let remote: IpAddr = "192.168.1.1".parse().unwrap();
        assert_eq!(extract_real_ip(&HeaderSet::new(), Some(remote)), Some(remote));
        assert_eq!(extract_real_ip(&HeaderSet::new(), None), None);
    }

    #[test]
    fn test_detect_proxy_type_order() {
        assert_eq!(
            detect_proxy_type(&headers(&[("cf-ray", "x"), ("x-real-ip", "1.1.1.1")])),
            ProxyVendor::Cloudflare
        );
        assert_eq!(
            detect_proxy_type(&headers(&[("CloudFront-Viewer-Country", "US")])),
            ProxyVendor::AwsCloudfront
        );
        assert_eq!(
            detect_proxy_type(&headers(&[
                ("x-forwarded-for", "1.1.1.1"),
                ("x-forwarded-proto", "https")
            ])),
            ProxyVendor::AwsAlb
        );
        assert_eq!(
            detect_proxy_type(&headers(&[("x-real-ip", "1.1.1.1")])),
            ProxyVendor::Nginx
        );
        assert_eq!(
            detect_proxy_type(&headers(&[("x-forwarded-for", "1.1.1.1")])),
            ProxyVendor::GenericProxy
        );
        assert_eq!(detect_proxy_type(&HeaderSet::new()), ProxyVendor::Direct);
    }

    #[test]
    fn test_cf_ray_shape() {
        assert!(is_valid_cf_ray("8f1e2d3c4b5a6978-SJC"));
        assert!(!is_valid_cf_ray("8f1e2d3c4b5a6978"));
        assert!(!is_valid_cf_ray("8F1E2D3C4B5A6978-SJC"));
        assert!(!is_valid_cf_ray("8f1e2d3c4b5a6978-sjc"));
        assert!(!is_valid_cf_ray("xyz-SJC"));
    }

    #[test]
    fn test_validate_rejects_bad_ray() {
        let h = headers(&[("cf-ray", "forged")]);
        assert!(matches!(
            validate_headers(&h, None),
            Err(HeaderValidationError::InvalidCfHeaders(_))
        ));
    }

    #[test]
    fn test_validate_forwarded_chain_against_allow_list() {
        let trusted = TrustedProxies::from_entries(&["10.0.0.0/8"]).unwrap();

        let ok = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(validate_headers(&ok, Some(&trusted)), Ok(()));

        let bad = headers(&[("x-forwarded-for", "203.0.113.9, 198.51.100.7")]);
        assert_eq!(
            validate_headers(&bad, Some(&trusted)),
            Err(HeaderValidationError::UntrustedForwardedHeaders {
                hop: "198.51.100.7".to_string()
            })
        );
    }

    #[test]
    fn test_validate_conflicting_protocol_signals() {
        let h = headers(&[("x-forwarded-proto", "https"), ("x-forwarded-ssl", "off")]);
        assert!(matches!(
            validate_headers(&h, None),
            Err(HeaderValidationError::InconsistentHeaders(_))
        ));

        let h = headers(&[
            ("x-forwarded-proto", "http"),
            ("cf-visitor", r#"{"scheme":"https"}"#),
        ]);
        assert!(validate_headers(&h, None).is_err());

        let h = headers(&[("x-forwarded-proto", "https"), ("x-forwarded-ssl", "on")]);
        assert!(validate_headers(&h, None).is_ok());
    }

    #[test]
    fn test_connection_info_defaults() {
        let info = extract_connection_info(&HeaderSet::new());
        assert_eq!(info.protocol, "http");
        assert_eq!(info.scheme, Scheme::Http);
        assert_eq!(info.port, None);
        assert_eq!(info.host, None);
        assert_eq!(info.user_agent, None);
    }

    #[test]
    fn test_connection_info_overrides() {
        let info = extract_connection_info(&headers(&[("x-forwarded-ssl", "on")]));
        assert_eq!(info.scheme, Scheme::Https);

        let info = extract_connection_info(&headers(&[
            ("x-forwarded-proto", "http"),
            ("cf-visitor", r#"{"scheme":"https"}"#),
        ]));
        assert_eq!(info.protocol, "https");
    }

    #[test]
    fn test_connection_info_swallows_malformed_json() {
        let info = extract_connection_info(&headers(&[("cf-visitor", "{scheme:")]));
        assert_eq!(info.protocol, "http");
    }

    #[test]
    fn test_connection_info_host_and_port() {
        let info = extract_connection_info(&headers(&[
            ("host", "example.com:8443"),
            ("user-agent", "Mozilla/5.0"),
        ]));
        assert_eq!(info.host.as_deref(), Some("example.com"));
        assert_eq!(info.port, Some(8443));
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0"));

        let info = extract_connection_info(&headers(&[
            ("x-forwarded-host", "[2001:db8::1]:8080"),
            ("x-forwarded-port", "not-a-port"),
        ]));
        assert_eq!(info.host.as_deref(), Some("2001:db8::1"));
        assert_eq!(info.port, Some(8080));

        let info = extract_connection_info(&headers(&[
            ("host", "example.com"),
            ("x-forwarded-port", "99999"),
        ]));
        assert_eq!(info.port, None);
    }
}
