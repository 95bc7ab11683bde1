//! Geographic resolution with IP anonymization
//!
//! Locations come from trusted CDN headers when available, otherwise from an
//! IP geolocator that only ever sees the anonymized client address.

pub mod anonymize;
pub mod cache;
pub mod distance;
pub mod enrich;
pub mod geoip;
pub mod lookup;
pub mod models;
pub mod proxy_headers;
pub mod resolver;
pub mod vpn;

use thiserror::Error;

pub use anonymize::{anonymize_ip, AnonymizationLevel, AnonymizedIp};
pub use cache::CachedGeoResolver;
pub use distance::calculate_distance;
pub use enrich::{enrich, normalize_country_code, validate_country_code};
pub use geoip::MaxMindGeolocator;
pub use lookup::{BuiltinGeolocator, IpGeolocator};
pub use models::{Confidence, CountryCode, GeoResult, GeoSource, GeoVendor};
pub use resolver::{extract_geographic_data, GeoOptions, GeoResolver, RequestContext};
pub use vpn::{detect_vpn_proxy, VpnAssessment};

/// Explicit rejects from geo operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeoError {
    #[error("Invalid country code: {0:?}")]
    InvalidCountryCode(String),

    #[error("Location is missing latitude/longitude")]
    MissingCoordinates,

    #[error("Insufficient data to infer a timezone")]
    InsufficientData,
}
