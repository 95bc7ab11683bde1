//! Vendor geo headers
//!
//! Each vendor has a fixed header layout. An extractor returns `None` when the
//! vendor's country header is missing or does not hold a usable code, so the
//! resolver can move on to the next vendor in priority order.

use tracing::debug;

use super::{Confidence, CountryCode, GeoResult, GeoSource, GeoVendor};
use crate::headers::HeaderSet;

struct VendorHeaders {
    country: &'static str,
    city: &'static str,
    region: &'static str,
    timezone: &'static str,
    latitude: Option<&'static str>,
    longitude: Option<&'static str>,
}

const CLOUDFLARE: VendorHeaders = VendorHeaders {
    country: "cf-ipcountry",
    city: "cf-ipcity",
    region: "cf-region",
    timezone: "cf-timezone",
    latitude: Some("cf-iplatitude"),
    longitude: Some("cf-iplongitude"),
};

const CLOUDFRONT: VendorHeaders = VendorHeaders {
    country: "cloudfront-viewer-country",
    city: "cloudfront-viewer-city",
    region: "cloudfront-viewer-country-region-name",
    timezone: "cloudfront-viewer-time-zone",
    latitude: Some("cloudfront-viewer-latitude"),
    longitude: Some("cloudfront-viewer-longitude"),
};

const FASTLY: VendorHeaders = VendorHeaders {
    country: "fastly-geo-country-code",
    city: "fastly-geo-city",
    region: "fastly-geo-region",
    timezone: "fastly-geo-timezone",
    latitude: Some("fastly-geo-latitude"),
    longitude: Some("fastly-geo-longitude"),
};

const GENERIC: VendorHeaders = VendorHeaders {
    country: "x-country-code",
    city: "x-city",
    region: "x-region",
    timezone: "x-timezone",
    latitude: None,
    longitude: None,
};

impl GeoVendor {
    /// Extraction order for proxy geo headers
    pub const PRIORITY: [GeoVendor; 4] = [
        GeoVendor::Cloudflare,
        GeoVendor::Cloudfront,
        GeoVendor::Fastly,
        GeoVendor::Generic,
    ];

    /// Name used in `trusted_proxies`; generic headers need no vendor trust
    pub fn trust_name(self) -> Option<&'static str> {
        match self {
            GeoVendor::Cloudflare => Some("cloudflare"),
            GeoVendor::Cloudfront => Some("cloudfront"),
            GeoVendor::Fastly => Some("fastly"),
            GeoVendor::Generic => None,
        }
    }

    pub fn confidence(self) -> Confidence {
        match self {
            GeoVendor::Generic => Confidence::Medium,
            _ => Confidence::High,
        }
    }

    fn headers(self) -> &'static VendorHeaders {
        match self {
            GeoVendor::Cloudflare => &CLOUDFLARE,
            GeoVendor::Cloudfront => &CLOUDFRONT,
            GeoVendor::Fastly => &FASTLY,
            GeoVendor::Generic => &GENERIC,
        }
    }
}

/// Extract a location from one vendor's headers
pub fn extract_vendor_geo(vendor: GeoVendor, headers: &HeaderSet) -> Option<GeoResult> {
    let layout = vendor.headers();
    let raw_country = headers.get_non_empty(layout.country)?;

    // Cloudflare reports XX for unknown and T1 for Tor exits
    let country_code = match CountryCode::normalize(raw_country) {
        Ok(code) if code.as_str() != "XX" => code,
        _ => {
            debug!(?vendor, value = raw_country, "ignoring unusable country header");
            return None;
        }
    };

    Some(GeoResult {
        country_code: Some(country_code),
        city: text(headers, layout.city),
        region: text(headers, layout.region),
        timezone: text(headers, layout.timezone),
        latitude: layout
            .latitude
            .and_then(|name| coordinate(headers, name, 90.0)),
        longitude: layout
            .longitude
            .and_then(|name| coordinate(headers, name, 180.0)),
        ..GeoResult::from_source(GeoSource::ProxyHeader(vendor), vendor.confidence())
    })
}

/// Header text, percent-decoded when it carries an encoding
fn text(headers: &HeaderSet, name: &str) -> Option<String> {
    let raw = headers.get_non_empty(name)?;
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded.trim().to_string()).filter(|s| !s.is_empty())
}

fn coordinate(headers: &HeaderSet, name: &str, limit: f64) -> Option<f64> {
    headers
        .get_non_empty(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && v.abs() <= limit)
}
