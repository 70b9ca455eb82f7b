//! Data models for USGS earthquake feed responses.
//!
//! These structures match the GeoJSON summary format. Only the fields the
//! dashboard reads are declared; serde ignores the rest.

use chrono::{DateTime, TimeZone, Utc};

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::errors::FetchError;

/// Top-level GeoJSON response from USGS feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    /// Feed metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,

    /// Earthquake events; features that do not deserialize are dropped
    #[serde(default, deserialize_with = "skip_malformed")]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Validate the response structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the top-level type is not a feature collection.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.type_ != "FeatureCollection" {
            return Err(FetchError::InvalidResponse(format!(
                "expected type 'FeatureCollection', got '{}'",
                self.type_
            )));
        }
        Ok(())
    }

    /// Convert every feature into a raw event, preserving feed order.
    #[must_use]
    pub fn raw_events(&self) -> Vec<RawEvent> {
        self.features.iter().map(RawEvent::from).collect()
    }
}

/// Deserialize each feature on its own so one bad record does not sink
/// the batch.
fn skip_malformed<'de, D>(deserializer: D) -> Result<Vec<Feature>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let total = values.len();
    let features: Vec<Feature> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            serde_json::from_value(value)
                .map_err(|e| debug!("skipping malformed feature #{}: {}", i, e))
                .ok()
        })
        .collect();
    if features.len() < total {
        debug!("kept {} of {} features", features.len(), total);
    }
    Ok(features)
}

/// Metadata about the feed response.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    /// When this feed was generated (ms since epoch)
    pub generated: Option<i64>,

    /// Human-readable title
    pub title: Option<String>,

    /// Number of events in response
    pub count: Option<usize>,
}

impl Metadata {
    #[must_use]
    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.generated
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// A single earthquake event as delivered by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// Unique event ID
    #[serde(default)]
    pub id: Option<String>,

    /// Geographic location
    #[serde(default)]
    pub geometry: Option<Geometry>,

    /// Event properties
    pub properties: Properties,
}

impl Feature {
    /// Stable identifier: the feature id, else the event code, else the
    /// first entry of the `ids` list.
    #[must_use]
    pub fn event_id(&self) -> String {
        self.id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.properties.code.clone().filter(|c| !c.is_empty()))
            .or_else(|| {
                self.properties.ids.as_deref().and_then(|ids| {
                    ids.split(',').find(|s| !s.is_empty()).map(str::to_string)
                })
            })
            .unwrap_or_default()
    }

    /// Get the event time as a `DateTime<Utc>`.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.properties
            .time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Get longitude (degrees).
    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        self.coordinate(0)
    }

    /// Get latitude (degrees).
    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        self.coordinate(1)
    }

    /// Get depth in kilometers (positive down).
    #[must_use]
    pub fn depth_km(&self) -> Option<f64> {
        self.coordinate(2)
    }

    fn coordinate(&self, index: usize) -> Option<f64> {
        self.geometry
            .as_ref()
            .and_then(|g| g.coordinates.get(index).copied().flatten())
    }
}

/// Geographic geometry for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    #[serde(default)]
    pub coordinates: Vec<Option<f64>>,
}

/// Event properties from the USGS feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Properties {
    /// Magnitude value
    pub mag: Option<f64>,

    /// Human-readable place description
    pub place: Option<String>,

    /// Event time (ms since epoch)
    pub time: Option<i64>,

    /// Event code
    pub code: Option<String>,

    /// Comma-separated event IDs
    pub ids: Option<String>,
}

/// An event record as fetched, before normalization.
///
/// Magnitude and coordinates stay optional: the normalizer decides what
/// counts as malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub id: String,
    pub magnitude: Option<f64>,
    pub place: Option<String>,
    pub time_utc: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_km: Option<f64>,
}

impl From<&Feature> for RawEvent {
    fn from(f: &Feature) -> Self {
        Self {
            id: f.event_id(),
            magnitude: f.properties.mag,
            place: f.properties.place.clone(),
            time_utc: f.time(),
            latitude: f.latitude(),
            longitude: f.longitude(),
            depth_km: f.depth_km(),
        }
    }
}
