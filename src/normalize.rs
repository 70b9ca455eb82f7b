//! Event normalization.
//!
//! Converts raw feed records into display-ready events: rounded magnitude,
//! colour tier, local time and distance from the resolved location. The
//! result is ordered newest first.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::filters::haversine_distance;
use crate::geo::ResolvedLocation;
use crate::models::RawEvent;

/// Placeholder for events the feed did not name.
const UNKNOWN_PLACE: &str = "Unknown location";

/// Coarse severity bucket used for colour coding.
///
/// Each tier includes its lower bound: 3.0 is Medium, 5.0 is High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeTier {
    Low,
    Medium,
    High,
}

impl MagnitudeTier {
    /// Classify an unrounded magnitude.
    #[must_use]
    pub fn from_magnitude(mag: f64) -> Self {
        match mag {
            m if m >= 5.0 => Self::High,
            m if m >= 3.0 => Self::Medium,
            _ => Self::Low,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Round to one decimal place, ties to even.
#[must_use]
pub fn round_magnitude(mag: f64) -> f64 {
    (mag * 10.0).round_ties_even() / 10.0
}

/// An event ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub id: String,
    /// Rounded to one decimal
    pub magnitude: f64,
    /// As reported; used for tiering and thresholds
    pub raw_magnitude: f64,
    pub place: String,
    pub time_utc: DateTime<Utc>,
    pub time_local: DateTime<Tz>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: Option<f64>,
    /// Great-circle distance from the resolved location
    pub distance_km: f64,
    pub tier: MagnitudeTier,
}

/// Normalize a batch of raw events against a resolved location.
///
/// Records without a magnitude, coordinates or time are skipped. Output is
/// sorted newest first; events with equal times keep feed order.
#[must_use]
pub fn normalize(raw: &[RawEvent], location: &ResolvedLocation) -> Vec<NormalizedEvent> {
    let tz = location.tz().unwrap_or_else(|e| {
        warn!("{e}; displaying times in UTC");
        chrono_tz::UTC
    });

    let mut events: Vec<NormalizedEvent> = raw
        .iter()
        .filter_map(|r| normalize_one(r, location, tz))
        .collect();

    let skipped = raw.len() - events.len();
    if skipped > 0 {
        debug!("skipped {} malformed of {} records", skipped, raw.len());
    }

    // sort_by is stable
    events.sort_by(|a, b| b.time_utc.cmp(&a.time_utc));
    events
}

fn normalize_one(raw: &RawEvent, location: &ResolvedLocation, tz: Tz) -> Option<NormalizedEvent> {
    let (Some(mag), Some(lat), Some(lon), Some(time_utc)) =
        (raw.magnitude, raw.latitude, raw.longitude, raw.time_utc)
    else {
        debug!("skipping malformed record {:?}", raw.id);
        return None;
    };
    if !mag.is_finite() || !lat.is_finite() || !lon.is_finite() {
        debug!("skipping non-finite record {:?}", raw.id);
        return None;
    }

    Some(NormalizedEvent {
        id: raw.id.clone(),
        magnitude: round_magnitude(mag),
        raw_magnitude: mag,
        place: raw
            .place
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
        time_utc,
        time_local: time_utc.with_timezone(&tz),
        latitude: lat,
        longitude: lon,
        depth_km: raw.depth_km,
        distance_km: haversine_distance(location.latitude, location.longitude, lat, lon),
        tier: MagnitudeTier::from_magnitude(mag),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;

    use super::*;

    pub(crate) fn location(tz: &str) -> ResolvedLocation {
        ResolvedLocation {
            latitude: 40.71,
            longitude: -74.01,
            timezone_name: tz.to_string(),
            label: "New York".into(),
            timezone_fallback: false,
        }
    }

    pub(crate) fn raw(id: &str, mag: Option<f64>, time_ms: i64) -> RawEvent {
        RawEvent {
            id: id.to_string(),
            magnitude: mag,
            place: Some(format!("near {id}")),
            time_utc: Utc.timestamp_millis_opt(time_ms).single(),
            latitude: Some(34.0),
            longitude: Some(-118.0),
            depth_km: Some(10.0),
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("valid date")
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(MagnitudeTier::from_magnitude(2.999), MagnitudeTier::Low);
        assert_eq!(MagnitudeTier::from_magnitude(3.0), MagnitudeTier::Medium);
        assert_eq!(MagnitudeTier::from_magnitude(4.99), MagnitudeTier::Medium);
        assert_eq!(MagnitudeTier::from_magnitude(5.0), MagnitudeTier::High);
        assert_eq!(MagnitudeTier::from_magnitude(-0.5), MagnitudeTier::Low);
    }

    #[test]
    fn test_rounding_is_idempotent() {
        for m in [0.0, 1.2, 2.5, 3.0, 4.7, 6.1, 7.9, -0.3] {
            assert_eq!(round_magnitude(m), m);
            assert_eq!(round_magnitude(round_magnitude(m)), round_magnitude(m));
        }
    }

    #[test]
    fn test_rounding_ties_to_even() {
        assert_eq!(round_magnitude(2.25), 2.2);
        assert_eq!(round_magnitude(2.75), 2.8);
        assert_eq!(round_magnitude(4.66), 4.7);
        assert_eq!(round_magnitude(1.04), 1.0);
    }

    #[test]
    fn test_tier_uses_unrounded_magnitude() {
        let events = normalize(&[raw("a", Some(2.999), 0)], &location("UTC"));
        assert_eq!(events[0].magnitude, 3.0);
        assert_eq!(events[0].tier, MagnitudeTier::Low);
    }

    #[test]
    fn test_new_york_standard_and_daylight_time() {
        let loc = location("America/New_York");
        let winter = utc(2024, 1, 15, 17, 0);
        let summer = utc(2024, 7, 1, 16, 0);
        let raws = [
            raw("winter", Some(2.0), winter.timestamp_millis()),
            raw("summer", Some(2.0), summer.timestamp_millis()),
        ];

        let events = normalize(&raws, &loc);
        let by_id = |id: &str| events.iter().find(|e| e.id == id).expect("event");

        // EST is UTC-5, EDT is UTC-4
        let w = by_id("winter").time_local;
        assert_eq!(w.format("%Y-%m-%d %H:%M %Z").to_string(), "2024-01-15 12:00 EST");
        let s = by_id("summer").time_local;
        assert_eq!(s.format("%Y-%m-%d %H:%M %Z").to_string(), "2024-07-01 12:00 EDT");
    }

    #[test]
    fn test_dst_transition_instant() {
        let loc = location("America/New_York");
        // 2024-03-10: clocks jump from 02:00 EST to 03:00 EDT at 07:00 UTC
        let before = utc(2024, 3, 10, 6, 59);
        let after = utc(2024, 3, 10, 7, 0);
        let events = normalize(
            &[
                raw("before", Some(1.0), before.timestamp_millis()),
                raw("after", Some(1.0), after.timestamp_millis()),
            ],
            &loc,
        );

        assert_eq!(events[0].id, "after");
        assert_eq!(events[0].time_local.format("%H:%M").to_string(), "03:00");
        assert_eq!(events[1].time_local.format("%H:%M").to_string(), "01:59");
    }

    #[test]
    fn test_malformed_record_skipped() {
        let raws = [
            raw("old", Some(2.0), 1_000),
            raw("bad", None, 2_000),
            raw("new", Some(3.5), 3_000),
        ];
        let events = normalize(&raws, &location("UTC"));

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[test]
    fn test_missing_coordinates_skipped() {
        let mut no_lat = raw("no_lat", Some(2.0), 1_000);
        no_lat.latitude = None;
        let mut no_lon = raw("no_lon", Some(2.0), 1_000);
        no_lon.longitude = None;

        assert!(normalize(&[no_lat, no_lon], &location("UTC")).is_empty());
    }

    #[test]
    fn test_equal_times_keep_feed_order() {
        let raws = [
            raw("first", Some(1.0), 5_000),
            raw("second", Some(1.0), 5_000),
            raw("newest", Some(1.0), 9_000),
            raw("third", Some(1.0), 5_000),
        ];
        let events = normalize(&raws, &location("UTC"));
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["newest", "first", "second", "third"]);
    }

    #[test]
    fn test_missing_place_and_distance() {
        let mut r = raw("a", Some(2.0), 0);
        r.place = None;
        let events = normalize(&[r], &location("UTC"));
        assert_eq!(events[0].place, "Unknown location");
        // New York to Los Angeles is roughly 3,940 km
        assert!(events[0].distance_km > 3_800.0 && events[0].distance_km < 4_100.0);
    }

    #[test]
    fn test_unknown_zone_displays_utc() {
        let events = normalize(&[raw("a", Some(2.0), 0)], &location("Not/AZone"));
        assert_eq!(events[0].time_local.timezone(), chrono_tz::UTC);
    }
}
