//! Display filters applied to normalized events.
//!
//! Minimum magnitude and maximum distance from the resolved location.

use std::f64::consts::PI;

use crate::normalize::NormalizedEvent;

/// Earth radius in kilometers for haversine calculations.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the great-circle distance between two points using the haversine formula.
///
/// Returns distance in kilometers.
#[must_use]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let delta_lat = (lat2 - lat1) * PI / 180.0;
    let delta_lon = (lon2 - lon1) * PI / 180.0;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Combined filter criteria. The default keeps everything.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DisplayFilter {
    pub min_magnitude: Option<f64>,
    pub max_distance_km: Option<f64>,
}

impl DisplayFilter {
    /// Check if an event passes all filter criteria.
    #[must_use]
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        self.check_magnitude(event) && self.check_distance(event)
    }

    /// Keep matching events, preserving order.
    #[must_use]
    pub fn apply(&self, events: &[NormalizedEvent]) -> Vec<NormalizedEvent> {
        events.iter().filter(|e| self.matches(e)).cloned().collect()
    }

    fn check_magnitude(&self, event: &NormalizedEvent) -> bool {
        self.min_magnitude.is_none_or(|min| event.raw_magnitude >= min)
    }

    fn check_distance(&self, event: &NormalizedEvent) -> bool {
        self.max_distance_km
            .is_none_or(|max| event.distance_km <= max)
    }
}

/// Parse a non-negative number, for CLI and form inputs.
///
/// # Errors
///
/// Returns a message if the input is not a finite number `>= 0`.
pub fn parse_non_negative(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid number '{s}': {e}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("expected a non-negative number, got {s}"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::ResolvedLocation;
    use crate::models::RawEvent;
    use crate::normalize::normalize;
    use chrono::{TimeZone, Utc};

    fn events() -> Vec<NormalizedEvent> {
        // Centre on San Francisco
        let here = ResolvedLocation {
            latitude: 37.77,
            longitude: -122.41,
            timezone_name: "America/Los_Angeles".into(),
            label: "SF".into(),
            timezone_fallback: false,
        };
        let mk = |id: &str, mag: f64, lat: f64, lon: f64, t: i64| RawEvent {
            id: id.into(),
            magnitude: Some(mag),
            place: None,
            time_utc: Utc.timestamp_millis_opt(t).single(),
            latitude: Some(lat),
            longitude: Some(lon),
            depth_km: None,
        };
        normalize(
            &[
                mk("oakland", 2.0, 37.80, -122.27, 3),
                mk("la", 4.5, 34.05, -118.24, 2),
                mk("tokyo", 6.0, 35.68, 139.69, 1),
            ],
            &here,
        )
    }

    #[test]
    fn test_haversine() {
        // SF to LA is roughly 560 km
        let distance = haversine_distance(37.77, -122.41, 34.05, -118.24);
        assert!(distance > 500.0 && distance < 620.0);
    }

    #[test]
    fn test_default_keeps_everything() {
        assert_eq!(DisplayFilter::default().apply(&events()).len(), 3);
    }

    #[test]
    fn test_min_magnitude_inclusive() {
        let filter = DisplayFilter {
            min_magnitude: Some(4.5),
            ..Default::default()
        };
        let ids: Vec<String> = filter.apply(&events()).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["la", "tokyo"]);
    }

    #[test]
    fn test_max_distance() {
        let filter = DisplayFilter {
            max_distance_km: Some(100.0),
            ..Default::default()
        };
        let ids: Vec<String> = filter.apply(&events()).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["oakland"]);
    }

    #[test]
    fn test_parse_non_negative() {
        assert_eq!(parse_non_negative(" 500 "), Ok(500.0));
        assert!(parse_non_negative("-1").is_err());
        assert!(parse_non_negative("inf").is_err());
        assert!(parse_non_negative("far").is_err());
    }
}
