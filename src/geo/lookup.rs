//! IP geolocation backends
//!
//! Geolocators only ever receive an [`AnonymizedIp`]; the raw client address
//! never reaches a lookup.

use ipnet::IpNet;
use std::sync::OnceLock;

use super::{AnonymizedIp, Confidence, CountryCode, GeoResult, GeoSource};

/// A source of IP-based locations
pub trait IpGeolocator: Send + Sync {
    /// Look up the location of an anonymized address
    ///
    /// Implementations set `source` and `confidence` on the returned result
    /// and absorb their own failures by returning `None`.
    fn lookup(&self, ip: &AnonymizedIp) -> Option<GeoResult>;
}

struct BuiltinEntry {
    network: &'static str,
    country: &'static str,
    region: Option<&'static str>,
    city: Option<&'static str>,
}

const fn entry(
    network: &'static str,
    country: &'static str,
    region: Option<&'static str>,
    city: Option<&'static str>,
) -> BuiltinEntry {
    BuiltinEntry {
        network,
        country,
        region,
        city,
    }
}

/// Coarse /16 (or wider) blocks so that entries still match fully anonymized
/// addresses
const BUILTIN_TABLE: &[BuiltinEntry] = &[
    entry("8.8.0.0/16", "US", Some("California"), Some("Mountain View")),
    entry("8.34.0.0/16", "US", None, None),
    entry("9.9.0.0/16", "US", None, None),
    entry("1.1.0.0/16", "AU", Some("New South Wales"), Some("Sydney")),
    entry("81.2.0.0/16", "GB", Some("England"), Some("London")),
    entry("89.160.0.0/16", "SE", None, None),
    entry("175.16.0.0/16", "CN", None, None),
    entry("202.196.0.0/16", "PH", None, None),
    entry("133.0.0.0/8", "JP", None, None),
    entry("91.198.0.0/16", "NL", Some("North Holland"), Some("Amsterdam")),
    entry("194.59.0.0/16", "DE", None, None),
    entry("2001:4860::/32", "US", None, None),
    entry("2a00:1450::/32", "IE", None, None),
    entry("2001:218::/32", "JP", None, None),
];

struct CompiledEntry {
    network: IpNet,
    country: CountryCode,
    region: Option<&'static str>,
    city: Option<&'static str>,
}

fn compiled_table() -> &'static [CompiledEntry] {
    static TABLE: OnceLock<Vec<CompiledEntry>> = OnceLock::new();
    TABLE.get_or_init(|| {
        BUILTIN_TABLE
            .iter()
            .filter_map(|e| {
                Some(CompiledEntry {
                    network: e.network.parse().ok()?,
                    country: CountryCode::parse(e.country).ok()?,
                    region: e.region,
                    city: e.city,
                })
            })
            .collect()
    })
}

/// Static-table geolocator with low confidence
///
/// Only a handful of well-known blocks are covered; everything else yields
/// no location.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinGeolocator;

impl IpGeolocator for BuiltinGeolocator {
    fn lookup(&self, ip: &AnonymizedIp) -> Option<GeoResult> {
        let addr = ip.addr();
        // Most specific block wins
        let hit = compiled_table()
            .iter()
            .filter(|e| e.network.contains(&addr))
            .max_by_key(|e| e.network.prefix_len())?;

        Some(GeoResult {
            country_code: Some(hit.country),
            region: hit.region.map(str::to_string),
            city: hit.city.map(str::to_string),
            ..GeoResult::from_source(GeoSource::IpGeolocation, Confidence::Low)
        })
    }
}
