//! USGS Earthquake API client.
//!
//! Provides blocking HTTP access to USGS earthquake summary feeds.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, instrument};

use crate::errors::FetchError;
use crate::models::{FeatureCollection, RawEvent};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
pub const USER_AGENT: &str = concat!("quakewatch/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for earthquake feeds.
const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Time range covered by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedWindow {
    Hour,
    Day,
    Week,
}

impl std::str::FromStr for FeedWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            _ => Err(format!("unknown feed window: {s}")),
        }
    }
}

/// Selectable summary feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedType {
    AllHour,
    #[default]
    AllDay,
    AllWeek,
    Mag1Week,
    Mag25Week,
    Mag45Week,
}

impl FeedType {
    /// Every feed, in the order the UI lists them.
    pub const ALL: [Self; 6] = [
        Self::AllHour,
        Self::AllDay,
        Self::AllWeek,
        Self::Mag1Week,
        Self::Mag25Week,
        Self::Mag45Week,
    ];

    /// Get the URL path segment for this feed type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllHour => "all_hour",
            Self::AllDay => "all_day",
            Self::AllWeek => "all_week",
            Self::Mag1Week => "1.0_week",
            Self::Mag25Week => "2.5_week",
            Self::Mag45Week => "4.5_week",
        }
    }

    /// Human-readable label for selectors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllHour => "Past Hour (all)",
            Self::AllDay => "Past Day (all)",
            Self::AllWeek => "Past 7 Days (all)",
            Self::Mag1Week => "Past 7 Days (M1.0+)",
            Self::Mag25Week => "Past 7 Days (M2.5+)",
            Self::Mag45Week => "Past 7 Days (M4.5+)",
        }
    }

    #[must_use]
    pub const fn window(self) -> FeedWindow {
        match self {
            Self::AllHour => FeedWindow::Hour,
            Self::AllDay => FeedWindow::Day,
            Self::AllWeek | Self::Mag1Week | Self::Mag25Week | Self::Mag45Week => {
                FeedWindow::Week
            }
        }
    }
}

impl From<FeedWindow> for FeedType {
    fn from(window: FeedWindow) -> Self {
        match window {
            FeedWindow::Hour => Self::AllHour,
            FeedWindow::Day => Self::AllDay,
            FeedWindow::Week => Self::AllWeek,
        }
    }
}

impl std::str::FromStr for FeedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all_hour" => Ok(Self::AllHour),
            "all_day" => Ok(Self::AllDay),
            "all_week" => Ok(Self::AllWeek),
            "1.0_week" => Ok(Self::Mag1Week),
            "2.5_week" => Ok(Self::Mag25Week),
            "4.5_week" => Ok(Self::Mag45Week),
            // bare window name selects that window's default feed
            other => other
                .parse::<FeedWindow>()
                .map(Self::from)
                .map_err(|_| format!("unknown feed type: {s}")),
        }
    }
}

/// Source of raw events for a feed.
///
/// One call is one request: no streaming, no retry.
pub trait FeedFetcher: Send + Sync {
    /// Fetch every event currently in `feed`, in feed order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a feed.
    fn fetch_events(&self, feed: FeedType) -> Result<Vec<RawEvent>, FetchError>;
}

/// Build the blocking HTTP client shared by all outbound calls.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
}

/// Client for USGS earthquake API.
pub struct UsgsClient {
    client: Client,
    base_url: String,
}

impl UsgsClient {
    /// Create a new USGS client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client()?,
            base_url: USGS_BASE_URL.to_string(),
        })
    }

    /// URL of a summary feed.
    #[must_use]
    pub fn feed_url(&self, feed_type: FeedType) -> String {
        format!(
            "{}/earthquakes/feed/v1.0/summary/{}.geojson",
            self.base_url,
            feed_type.as_str()
        )
    }

    /// Fetch a summary GeoJSON feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or response cannot be parsed.
    #[instrument(skip(self), fields(feed = feed_type.as_str(), window = ?feed_type.window()))]
    pub fn fetch_feed(&self, feed_type: FeedType) -> Result<FeatureCollection, FetchError> {
        let url = self.feed_url(feed_type);

        debug!("fetching feed from {}", url);

        let response = self.client.get(&url).send()?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let feed: FeatureCollection = response.json()?;
        feed.validate()?;

        if let Some(meta) = &feed.metadata {
            debug!(
                "feed '{}' generated at {:?} reports {:?} events",
                meta.title.as_deref().unwrap_or_default(),
                meta.generated_at(),
                meta.count
            );
        }
        debug!("fetched {} usable features", feed.features.len());
        Ok(feed)
    }
}

impl FeedFetcher for UsgsClient {
    fn fetch_events(&self, feed: FeedType) -> Result<Vec<RawEvent>, FetchError> {
        Ok(self.fetch_feed(feed)?.raw_events())
    }
}
