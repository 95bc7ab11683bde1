//! Post-processing applied to every resolved location
//!
//! Attaches a country name, infers a timezone when none was reported, and
//! strips sub-country detail when only country granularity is wanted.

use super::{CountryCode, GeoError, GeoResult};

const UNKNOWN_COUNTRY: &str = "Unknown";

const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("AE", "United Arab Emirates"),
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CL", "Chile"),
    ("CN", "China"),
    ("CO", "Colombia"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GR", "Greece"),
    ("HK", "Hong Kong"),
    ("HU", "Hungary"),
    ("ID", "Indonesia"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KE", "Kenya"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("MY", "Malaysia"),
    ("NG", "Nigeria"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PH", "Philippines"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RU", "Russia"),
    ("SA", "Saudi Arabia"),
    ("SE", "Sweden"),
    ("SG", "Singapore"),
    ("TH", "Thailand"),
    ("TR", "Turkey"),
    ("TW", "Taiwan"),
    ("UA", "Ukraine"),
    ("US", "United States"),
    ("VN", "Vietnam"),
    ("ZA", "South Africa"),
];

/// Lowercase city name to IANA timezone
const CITY_TIMEZONES: &[(&str, &str)] = &[
    ("amsterdam", "Europe/Amsterdam"),
    ("atlanta", "America/New_York"),
    ("auckland", "Pacific/Auckland"),
    ("bangalore", "Asia/Kolkata"),
    ("bangkok", "Asia/Bangkok"),
    ("berlin", "Europe/Berlin"),
    ("boston", "America/New_York"),
    ("buenos aires", "America/Argentina/Buenos_Aires"),
    ("chicago", "America/Chicago"),
    ("dallas", "America/Chicago"),
    ("denver", "America/Denver"),
    ("dubai", "Asia/Dubai"),
    ("dublin", "Europe/Dublin"),
    ("frankfurt", "Europe/Berlin"),
    ("hong kong", "Asia/Hong_Kong"),
    ("istanbul", "Europe/Istanbul"),
    ("jakarta", "Asia/Jakarta"),
    ("johannesburg", "Africa/Johannesburg"),
    ("lagos", "Africa/Lagos"),
    ("london", "Europe/London"),
    ("los angeles", "America/Los_Angeles"),
    ("madrid", "Europe/Madrid"),
    ("melbourne", "Australia/Melbourne"),
    ("mexico city", "America/Mexico_City"),
    ("miami", "America/New_York"),
    ("montreal", "America/Toronto"),
    ("moscow", "Europe/Moscow"),
    ("mountain view", "America/Los_Angeles"),
    ("mumbai", "Asia/Kolkata"),
    ("new york", "America/New_York"),
    ("paris", "Europe/Paris"),
    ("perth", "Australia/Perth"),
    ("phoenix", "America/Phoenix"),
    ("rome", "Europe/Rome"),
    ("san francisco", "America/Los_Angeles"),
    ("sao paulo", "America/Sao_Paulo"),
    ("são paulo", "America/Sao_Paulo"),
    ("seattle", "America/Los_Angeles"),
    ("seoul", "Asia/Seoul"),
    ("singapore", "Asia/Singapore"),
    ("stockholm", "Europe/Stockholm"),
    ("sydney", "Australia/Sydney"),
    ("tokyo", "Asia/Tokyo"),
    ("toronto", "America/Toronto"),
    ("vancouver", "America/Vancouver"),
    ("warsaw", "Europe/Warsaw"),
    ("zurich", "Europe/Zurich"),
];

/// Representative timezone per country; coarse for multi-zone countries
const COUNTRY_TIMEZONES: &[(&str, &str)] = &[
    ("AE", "Asia/Dubai"),
    ("AR", "America/Argentina/Buenos_Aires"),
    ("AT", "Europe/Vienna"),
    ("AU", "Australia/Sydney"),
    ("BE", "Europe/Brussels"),
    ("BR", "America/Sao_Paulo"),
    ("CA", "America/Toronto"),
    ("CH", "Europe/Zurich"),
    ("CL", "America/Santiago"),
    ("CN", "Asia/Shanghai"),
    ("CO", "America/Bogota"),
    ("CZ", "Europe/Prague"),
    ("DE", "Europe/Berlin"),
    ("DK", "Europe/Copenhagen"),
    ("EG", "Africa/Cairo"),
    ("ES", "Europe/Madrid"),
    ("FI", "Europe/Helsinki"),
    ("FR", "Europe/Paris"),
    ("GB", "Europe/London"),
    ("GR", "Europe/Athens"),
    ("HK", "Asia/Hong_Kong"),
    ("HU", "Europe/Budapest"),
    ("ID", "Asia/Jakarta"),
    ("IE", "Europe/Dublin"),
    ("IL", "Asia/Jerusalem"),
    ("IN", "Asia/Kolkata"),
    ("IT", "Europe/Rome"),
    ("JP", "Asia/Tokyo"),
    ("KE", "Africa/Nairobi"),
    ("KR", "Asia/Seoul"),
    ("MX", "America/Mexico_City"),
    ("MY", "Asia/Kuala_Lumpur"),
    ("NG", "Africa/Lagos"),
    ("NL", "Europe/Amsterdam"),
    ("NO", "Europe/Oslo"),
    ("NZ", "Pacific/Auckland"),
    ("PH", "Asia/Manila"),
    ("PL", "Europe/Warsaw"),
    ("PT", "Europe/Lisbon"),
    ("RO", "Europe/Bucharest"),
    ("RU", "Europe/Moscow"),
    ("SA", "Asia/Riyadh"),
    ("SE", "Europe/Stockholm"),
    ("SG", "Asia/Singapore"),
    ("TH", "Asia/Bangkok"),
    ("TR", "Europe/Istanbul"),
    ("TW", "Asia/Taipei"),
    ("UA", "Europe/Kyiv"),
    ("US", "America/New_York"),
    ("VN", "Asia/Ho_Chi_Minh"),
    ("ZA", "Africa/Johannesburg"),
];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Strict country-code check for caller-supplied codes
pub fn validate_country_code(code: &str) -> Result<CountryCode, GeoError> {
    CountryCode::parse(code)
}

/// Trim and upper-case a code before validating it
pub fn normalize_country_code(code: &str) -> Result<CountryCode, GeoError> {
    CountryCode::normalize(code)
}

/// English name for a country code, `"Unknown"` when not in the table
pub fn country_name(code: &CountryCode) -> &'static str {
    lookup(COUNTRY_NAMES, code.as_str()).unwrap_or(UNKNOWN_COUNTRY)
}

/// Infer a timezone from the city, then the country
///
/// # Returns
/// `GeoError::InsufficientData` when neither table has an entry
pub fn infer_timezone(
    city: Option<&str>,
    country: Option<&CountryCode>,
) -> Result<&'static str, GeoError> {
    city.and_then(|c| lookup(CITY_TIMEZONES, &c.trim().to_lowercase()))
        .or_else(|| country.and_then(|c| lookup(COUNTRY_TIMEZONES, c.as_str())))
        .ok_or(GeoError::InsufficientData)
}

/// Fill in derived fields and apply de-precision
pub fn enrich(mut result: GeoResult, country_only: bool) -> GeoResult {
    if let Some(code) = &result.country_code {
        if result.country_name.is_none() {
            result.country_name = Some(country_name(code).to_string());
        }
    }

    if result.timezone.is_none() {
        result.timezone = infer_timezone(result.city.as_deref(), result.country_code.as_ref())
            .ok()
            .map(str::to_string);
    }

    if country_only {
        result.city = None;
        result.region = None;
        result.latitude = None;
        result.longitude = None;
    }

    result
}
