//! IP geolocation backed by a local MaxMind GeoLite2/GeoIP2 City database
//!
//! The database is read once into memory; lookups are lock-free and the
//! reader is shared between clones.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Reader};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use super::lookup::IpGeolocator;
use super::{AnonymizedIp, Confidence, CountryCode, GeoResult, GeoSource};

/// City database geolocator with medium confidence
#[derive(Clone)]
pub struct MaxMindGeolocator {
    city_reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindGeolocator {
    /// Open a City (or Country) database
    ///
    /// # Arguments
    /// * `path` - Path to the GeoLite2-City or GeoIP2-City .mmdb file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)
            .with_context(|| format!("Failed to open GeoIP City database at {}", path.display()))?;

        Ok(Self {
            city_reader: Arc::new(reader),
        })
    }

    /// Extract location from City data
    fn extract_from_city(city: &geoip2::City, geo: &mut GeoResult) {
        geo.country_code = city
            .country
            .iso_code
            .and_then(|code| CountryCode::normalize(code).ok());
        geo.country_name = city.country.names.english.map(|s| s.to_string());

        if let Some(subdivision) = city.subdivisions.first() {
            geo.region = subdivision.names.english.map(|s| s.to_string());
        }

        geo.city = city.city.names.english.map(|s| s.to_string());
        geo.latitude = city.location.latitude;
        geo.longitude = city.location.longitude;
        geo.timezone = city.location.time_zone.map(|s| s.to_string());
    }

    /// Extract location from Country data (when City is not available)
    fn extract_from_country(country: &geoip2::Country, geo: &mut GeoResult) {
        geo.country_code = country
            .country
            .iso_code
            .and_then(|code| CountryCode::normalize(code).ok());
        geo.country_name = country.country.names.english.map(|s| s.to_string());
    }
}

impl IpGeolocator for MaxMindGeolocator {
    fn lookup(&self, ip: &AnonymizedIp) -> Option<GeoResult> {
        let mut geo = GeoResult::from_source(GeoSource::IpGeolocation, Confidence::Medium);

        let result = match self.city_reader.lookup(ip.addr()) {
            Ok(result) => result,
            Err(e) => {
                warn!(ip = %ip, error = %e, "GeoIP lookup failed");
                return None;
            }
        };

        // The City database is a superset of Country data, so a Country decode
        // still works on records that carry no city detail.
        if let Ok(Some(city)) = result.decode::<geoip2::City>() {
            Self::extract_from_city(&city, &mut geo);
        } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
            Self::extract_from_country(&country, &mut geo);
        }

        if geo.country_code.is_none() && geo.city.is_none() {
            return None;
        }
        Some(geo)
    }
}
