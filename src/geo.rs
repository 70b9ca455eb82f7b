//! Location resolution.
//!
//! Turns the user's location mode into coordinates, a label and an IANA
//! timezone. Network lookups and the polygon timezone finder sit behind
//! traits so the resolver can run against stubs.

use chrono_tz::Tz;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::client::http_client;
use crate::errors::{GeolocationError, TimezoneLookupError};

const IPINFO_URL: &str = "https://ipinfo.io/json";
const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Prefix of the whole-hour zones covering open ocean.
const NAUTICAL_ZONE_PREFIX: &str = "Etc/";

/// Zone used when the coordinates fall outside every timezone polygon.
pub const FALLBACK_TIMEZONE: &str = "UTC";

/// How the user chose their location.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LocationMode {
    /// Detect from the public IP address
    #[default]
    AutoIp,
    /// ISO 3166-1 alpha-2 country code, geocoded to the country centroid
    Country(String),
    /// Explicit coordinates
    Manual { lat: f64, lon: f64 },
}

/// Coordinates, label and timezone derived from a [`LocationMode`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone_name: String,
    pub label: String,
    /// Set when the timezone lookup failed and UTC was substituted.
    pub timezone_fallback: bool,
}

impl ResolvedLocation {
    /// Parse the stored zone name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA identifier.
    pub fn tz(&self) -> Result<Tz, TimezoneLookupError> {
        self.timezone_name
            .parse::<Tz>()
            .map_err(|_| TimezoneLookupError::UnknownZone(self.timezone_name.clone()))
    }
}

/// A point with a human-readable description.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

/// Outbound lookups used by the non-manual location modes.
pub trait LocationLookup: Send + Sync {
    /// Locate the caller by public IP address.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or has no coordinates.
    fn ip_location(&self) -> Result<Place, GeolocationError>;

    /// Geocode a validated, upper-case alpha-2 country code.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the country is unknown.
    fn country_centroid(&self, code: &str) -> Result<Place, GeolocationError>;
}

/// Maps coordinates to an IANA timezone name.
pub trait TimezoneFinder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no timezone polygon contains the point.
    fn timezone_at(&self, lat: f64, lon: f64) -> Result<String, TimezoneLookupError>;
}

/// Point-in-polygon lookup over the embedded timezone boundary data.
///
/// Points outside every land zone come back from the boundary data as
/// nautical `Etc/GMT±N` zones; those are reported as [`TimezoneLookupError::NoZone`].
pub struct PolygonTimezoneFinder {
    finder: tzf_rs::DefaultFinder,
}

impl PolygonTimezoneFinder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            finder: tzf_rs::DefaultFinder::new(),
        }
    }
}

impl Default for PolygonTimezoneFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneFinder for PolygonTimezoneFinder {
    fn timezone_at(&self, lat: f64, lon: f64) -> Result<String, TimezoneLookupError> {
        let name = self.finder.get_tz_name(lon, lat);
        if name.is_empty() || name.starts_with(NAUTICAL_ZONE_PREFIX) {
            return Err(TimezoneLookupError::NoZone { lat, lon });
        }
        Ok(name.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct IpInfo {
    loc: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

/// ipinfo.io and Nominatim over HTTPS.
pub struct HttpLocationLookup {
    client: Client,
}

impl HttpLocationLookup {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client()?,
        })
    }
}

impl LocationLookup for HttpLocationLookup {
    #[instrument(skip(self))]
    fn ip_location(&self) -> Result<Place, GeolocationError> {
        let info: IpInfo = self
            .client
            .get(IPINFO_URL)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|r| r.json::<IpInfo>())
            .map_err(|e| GeolocationError::IpLookup(e.to_string()))?;

        let (lat, lon) = info
            .loc
            .as_deref()
            .and_then(parse_loc)
            .ok_or_else(|| GeolocationError::IpLookup("response has no usable 'loc'".into()))?;

        let label = [info.city, info.country]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let label = if label.is_empty() {
            "IP location".to_string()
        } else {
            label
        };

        debug!("ip location: {} ({lat}, {lon})", label);
        Ok(Place { lat, lon, label })
    }

    #[instrument(skip(self))]
    fn country_centroid(&self, code: &str) -> Result<Place, GeolocationError> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(NOMINATIM_URL)
            .query(&[("country", code), ("format", "json"), ("limit", "1")])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|r| r.json::<Vec<NominatimPlace>>())
            .map_err(|e| GeolocationError::CountryLookup(e.to_string()))?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| GeolocationError::UnknownCountry(code.to_string()))?;

        let lat = place.lat.trim().parse::<f64>();
        let lon = place.lon.trim().parse::<f64>();
        let (Ok(lat), Ok(lon)) = (lat, lon) else {
            return Err(GeolocationError::CountryLookup(format!(
                "unparseable coordinates '{}', '{}'",
                place.lat, place.lon
            )));
        };

        Ok(Place {
            lat,
            lon,
            label: place.display_name.unwrap_or_else(|| code.to_string()),
        })
    }
}

/// Parse ipinfo's `"lat,lon"` field.
fn parse_loc(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// Check that coordinates are on the globe. NaN is rejected.
///
/// # Errors
///
/// Returns the first out-of-range component.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), GeolocationError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeolocationError::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeolocationError::LongitudeOutOfRange(lon));
    }
    Ok(())
}

/// Normalize a country code to upper-case alpha-2.
///
/// # Errors
///
/// Returns an error unless the input is exactly two ASCII letters.
pub fn normalize_country_code(code: &str) -> Result<String, GeolocationError> {
    let code = code.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(GeolocationError::UnknownCountry(code.to_string()))
    }
}

/// Resolves location modes using a lookup backend and a timezone finder.
pub struct GeolocationResolver {
    lookup: Box<dyn LocationLookup>,
    timezones: Box<dyn TimezoneFinder>,
}

impl GeolocationResolver {
    #[must_use]
    pub fn new(lookup: Box<dyn LocationLookup>, timezones: Box<dyn TimezoneFinder>) -> Self {
        Self { lookup, timezones }
    }

    /// Resolve a location mode.
    ///
    /// A failed timezone lookup is not an error: the result carries UTC and
    /// `timezone_fallback` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be determined or the
    /// coordinates are out of range.
    pub fn resolve(&self, mode: &LocationMode) -> Result<ResolvedLocation, GeolocationError> {
        let place = match mode {
            LocationMode::AutoIp => self.lookup.ip_location()?,
            LocationMode::Country(code) => {
                let code = normalize_country_code(code)?;
                let mut place = self.lookup.country_centroid(&code)?;
                if place.label.is_empty() {
                    place.label = code;
                }
                place
            }
            LocationMode::Manual { lat, lon } => Place {
                lat: *lat,
                lon: *lon,
                label: format!("Custom: {lat:.2}, {lon:.2}"),
            },
        };

        validate_coordinates(place.lat, place.lon)?;

        let (timezone_name, timezone_fallback) =
            match self.timezones.timezone_at(place.lat, place.lon) {
                Ok(name) => (name, false),
                Err(e) => {
                    warn!("{e}; falling back to {FALLBACK_TIMEZONE}");
                    (FALLBACK_TIMEZONE.to_string(), true)
                }
            };

        debug!(
            "resolved {:?} to {} ({}, {}) in {}",
            mode, place.label, place.lat, place.lon, timezone_name
        );

        Ok(ResolvedLocation {
            latitude: place.lat,
            longitude: place.lon,
            timezone_name,
            label: place.label,
            timezone_fallback,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Lookup stub returning fixed places and counting calls.
    #[derive(Default, Clone)]
    pub(crate) struct StubLookup {
        pub calls: Arc<AtomicUsize>,
        pub fail_ip: bool,
    }

    impl LocationLookup for StubLookup {
        fn ip_location(&self) -> Result<Place, GeolocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ip {
                return Err(GeolocationError::IpLookup("connection refused".into()));
            }
            Ok(Place {
                lat: 35.68,
                lon: 139.69,
                label: "Tokyo, JP".into(),
            })
        }

        fn country_centroid(&self, code: &str) -> Result<Place, GeolocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match code {
                "PH" => Ok(Place {
                    lat: 12.75,
                    lon: 122.73,
                    label: "Philippines".into(),
                }),
                _ => Err(GeolocationError::UnknownCountry(code.into())),
            }
        }
    }

    /// Finder stub: New York box, Tokyo, Manila; everything else is ocean.
    pub(crate) struct StubFinder;

    impl TimezoneFinder for StubFinder {
        fn timezone_at(&self, lat: f64, lon: f64) -> Result<String, TimezoneLookupError> {
            if (40.0..42.0).contains(&lat) && (-75.0..-73.0).contains(&lon) {
                Ok("America/New_York".into())
            } else if (35.0..36.0).contains(&lat) && (139.0..140.0).contains(&lon) {
                Ok("Asia/Tokyo".into())
            } else if (5.0..20.0).contains(&lat) && (117.0..127.0).contains(&lon) {
                Ok("Asia/Manila".into())
            } else {
                Err(TimezoneLookupError::NoZone { lat, lon })
            }
        }
    }

    pub(crate) fn stub_resolver(lookup: StubLookup) -> GeolocationResolver {
        GeolocationResolver::new(Box::new(lookup), Box::new(StubFinder))
    }

    #[test]
    fn test_manual_mode_is_local() {
        let lookup = StubLookup::default();
        let resolver = stub_resolver(lookup.clone());

        let loc = resolver
            .resolve(&LocationMode::Manual {
                lat: 40.71,
                lon: -74.01,
            })
            .expect("resolve");

        assert_eq!(loc.timezone_name, "America/New_York");
        assert_eq!(loc.label, "Custom: 40.71, -74.01");
        assert!(!loc.timezone_fallback);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_out_of_range() {
        let resolver = stub_resolver(StubLookup::default());

        let err = resolver
            .resolve(&LocationMode::Manual { lat: 91.0, lon: 0.0 })
            .unwrap_err();
        assert!(matches!(err, GeolocationError::LatitudeOutOfRange(_)));

        let err = resolver
            .resolve(&LocationMode::Manual {
                lat: 0.0,
                lon: -180.5,
            })
            .unwrap_err();
        assert!(matches!(err, GeolocationError::LongitudeOutOfRange(_)));

        let err = resolver
            .resolve(&LocationMode::Manual {
                lat: f64::NAN,
                lon: 0.0,
            })
            .unwrap_err();
        assert!(matches!(err, GeolocationError::LatitudeOutOfRange(_)));
    }

    #[test]
    fn test_boundary_coordinates_accepted() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_auto_ip() {
        let resolver = stub_resolver(StubLookup::default());
        let loc = resolver.resolve(&LocationMode::AutoIp).expect("resolve");
        assert_eq!(loc.label, "Tokyo, JP");
        assert_eq!(loc.timezone_name, "Asia/Tokyo");
    }

    #[test]
    fn test_auto_ip_failure_is_an_error() {
        let resolver = stub_resolver(StubLookup {
            fail_ip: true,
            ..StubLookup::default()
        });
        assert!(matches!(
            resolver.resolve(&LocationMode::AutoIp),
            Err(GeolocationError::IpLookup(_))
        ));
    }

    #[test]
    fn test_country_code_normalized() {
        let resolver = stub_resolver(StubLookup::default());
        let loc = resolver
            .resolve(&LocationMode::Country(" ph ".into()))
            .expect("resolve");
        assert_eq!(loc.label, "Philippines");
        assert_eq!(loc.timezone_name, "Asia/Manila");
    }

    #[test]
    fn test_malformed_country_rejected_without_lookup() {
        let lookup = StubLookup::default();
        let resolver = stub_resolver(lookup.clone());

        for code in ["", "P", "PHL", "1A"] {
            assert!(matches!(
                resolver.resolve(&LocationMode::Country(code.into())),
                Err(GeolocationError::UnknownCountry(_))
            ));
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_country() {
        let resolver = stub_resolver(StubLookup::default());
        assert!(matches!(
            resolver.resolve(&LocationMode::Country("ZZ".into())),
            Err(GeolocationError::UnknownCountry(_))
        ));
    }

    #[test]
    fn test_open_ocean_falls_back_to_utc() {
        let resolver = stub_resolver(StubLookup::default());
        let loc = resolver
            .resolve(&LocationMode::Manual {
                lat: -40.0,
                lon: -120.0,
            })
            .expect("resolve");
        assert_eq!(loc.timezone_name, FALLBACK_TIMEZONE);
        assert!(loc.timezone_fallback);
        assert_eq!(loc.tz(), Ok(chrono_tz::UTC));
    }

    #[test]
    fn test_unknown_zone_name() {
        let loc = ResolvedLocation {
            latitude: 0.0,
            longitude: 0.0,
            timezone_name: "Mars/Olympus_Mons".into(),
            label: String::new(),
            timezone_fallback: false,
        };
        assert_eq!(
            loc.tz(),
            Err(TimezoneLookupError::UnknownZone("Mars/Olympus_Mons".into()))
        );
    }

    #[test]
    fn test_parse_loc() {
        assert_eq!(parse_loc("14.5995,120.9842"), Some((14.5995, 120.9842)));
        assert_eq!(parse_loc(" -33.9 , 18.4 "), Some((-33.9, 18.4)));
        assert_eq!(parse_loc("nowhere"), None);
        assert_eq!(parse_loc("1.0,abc"), None);
    }

    #[test]
    fn test_polygon_finder_new_york() {
        let finder = PolygonTimezoneFinder::new();
        let name = finder.timezone_at(40.7128, -74.0060).expect("zone");
        assert_eq!(name, "America/New_York");
    }

    #[test]
    fn test_polygon_finder_open_ocean() {
        let finder = PolygonTimezoneFinder::new();
        for (lat, lon) in [(-40.0, -120.0), (0.0, -160.0)] {
            assert_eq!(
                finder.timezone_at(lat, lon),
                Err(TimezoneLookupError::NoZone { lat, lon })
            );
        }
    }

    #[test]
    fn test_real_finder_ocean_falls_back_to_utc() {
        let resolver = GeolocationResolver::new(
            Box::new(StubLookup::default()),
            Box::new(PolygonTimezoneFinder::new()),
        );
        let loc = resolver
            .resolve(&LocationMode::Manual {
                lat: -40.0,
                lon: -120.0,
            })
            .expect("resolve");
        assert_eq!(loc.timezone_name, FALLBACK_TIMEZONE);
        assert!(loc.timezone_fallback);
    }
}
