//! Error types for quakewatch.
//!
//! Uses `thiserror` for library-style error definitions. Each pipeline
//! stage has its own error so callers can decide how to degrade.

use thiserror::Error;

/// Errors from fetching a USGS feed.
///
/// Never fatal to a session: the dashboard shows an empty state instead.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// API returned an error status
    #[error("USGS API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from turning a location mode into coordinates.
///
/// These block the pipeline until the user picks a usable location.
#[derive(Error, Debug)]
pub enum GeolocationError {
    /// IP-based lookup failed or returned no usable location
    #[error("IP geolocation failed: {0}")]
    IpLookup(String),

    /// Country code is malformed or unknown to the geocoder
    #[error("unrecognized country code: {0}")]
    UnknownCountry(String),

    /// Country geocoding request failed
    #[error("country lookup failed: {0}")]
    CountryLookup(String),

    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// Errors from mapping coordinates or names to a timezone.
///
/// Non-fatal: callers fall back to UTC.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimezoneLookupError {
    /// No timezone polygon contains the point (open ocean, poles)
    #[error("no timezone found at {lat:.4}, {lon:.4}")]
    NoZone { lat: f64, lon: f64 },

    /// Zone name is not a known IANA identifier
    #[error("unknown IANA timezone: {0}")]
    UnknownZone(String),
}
