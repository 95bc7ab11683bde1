//! Data models for geographic resolution

use serde::{Deserialize, Serialize};
use std::fmt;

use super::GeoError;

/// ISO 3166-1 alpha-2 country code, always two uppercase ASCII letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Strict parse: exactly two uppercase ASCII letters, nothing else
    pub fn parse(raw: &str) -> Result<Self, GeoError> {
        match raw.as_bytes() {
            [a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => Ok(Self([*a, *b])),
            _ => Err(GeoError::InvalidCountryCode(raw.to_string())),
        }
    }

    /// Lenient parse used on header input: trims and upper-cases first
    pub fn normalize(raw: &str) -> Result<Self, GeoError> {
        Self::parse(&raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII uppercase by construction
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for CountryCode {
    type Error = GeoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.as_str().to_string()
    }
}

/// Coarse reliability label for a derived location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// CDN or proxy whose geo headers produced a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoVendor {
    Cloudflare,
    Cloudfront,
    Fastly,
    Generic,
}

/// Where a location came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "vendor", rename_all = "snake_case")]
pub enum GeoSource {
    ProxyHeader(GeoVendor),
    IpGeolocation,
    Unknown,
}

/// Geographic location derived for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    pub country_code: Option<CountryCode>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    /// Region/state/province
    pub region: Option<String>,
    /// IANA timezone name (e.g., "Europe/Berlin")
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source: GeoSource,
    pub confidence: Confidence,
}

impl Default for GeoResult {
    fn default() -> Self {
        Self {
            country_code: None,
            country_name: None,
            city: None,
            region: None,
            timezone: None,
            latitude: None,
            longitude: None,
            source: GeoSource::Unknown,
            confidence: Confidence::Low,
        }
    }
}

impl GeoResult {
    /// An empty result attributed to a source
    pub fn from_source(source: GeoSource, confidence: Confidence) -> Self {
        Self {
            source,
            confidence,
            ..Default::default()
        }
    }

    /// Latitude/longitude pair when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn is_unknown(&self) -> bool {
        self.source == GeoSource::Unknown
    }
}
