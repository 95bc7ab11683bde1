//! Great-circle distance between two locations

use super::{GeoError, GeoResult};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two coordinate pairs
pub fn haversine_km((lat1, lon1): (f64, f64), (lat2, lon2): (f64, f64)) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance in kilometres between two resolved locations
///
/// # Returns
/// `GeoError::MissingCoordinates` when either side lacks latitude/longitude
pub fn calculate_distance(a: &GeoResult, b: &GeoResult) -> Result<f64, GeoError> {
    let from = a.coordinates().ok_or(GeoError::MissingCoordinates)?;
    let to = b.coordinates().ok_or(GeoError::MissingCoordinates)?;
    Ok(haversine_km(from, to))
}
