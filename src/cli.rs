//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Args, Parser, Subcommand};

use crate::client::FeedType;
use crate::dashboard::TimeDisplay;
use crate::filters::parse_non_negative;
use crate::geo::LocationMode;
use crate::output::Format;
use crate::paginate::PAGE_SIZE;

/// Shortest auto-refresh interval the UI accepts, in seconds.
pub const MIN_REFRESH_SECS: u64 = 15;

/// Longest auto-refresh interval the UI accepts, in seconds.
pub const MAX_REFRESH_SECS: u64 = 300;

/// Location-aware earthquake dashboard.
#[derive(Parser, Debug)]
#[command(name = "quakewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web dashboard
    Ui(UiArgs),

    /// Print one page of nearby earthquakes and exit
    Tail(TailArgs),
}

/// Where the dashboard is centered. Defaults to IP geolocation.
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    /// ISO 3166-1 alpha-2 country code (e.g. JP)
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub country: Option<String>,

    /// Manual latitude in degrees
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Manual longitude in degrees
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    #[must_use]
    pub fn mode(&self) -> LocationMode {
        match (&self.country, self.lat, self.lon) {
            (Some(code), _, _) => LocationMode::Country(code.clone()),
            (None, Some(lat), Some(lon)) => LocationMode::Manual { lat, lon },
            _ => LocationMode::AutoIp,
        }
    }
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Feed to show on first load
    #[arg(long, default_value = "all_day", value_parser = parse_feed_type)]
    pub feed: FeedType,

    /// Auto-refresh interval in seconds (0 disables)
    #[arg(long, default_value = "60")]
    pub refresh: u64,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

impl UiArgs {
    /// Refresh interval clamped to the accepted range, or 0 when disabled.
    #[must_use]
    pub fn refresh_secs(&self) -> u64 {
        if self.refresh == 0 {
            0
        } else {
            self.refresh.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS)
        }
    }
}

/// Arguments for the `tail` command.
#[derive(Parser, Debug)]
pub struct TailArgs {
    /// Feed to fetch
    #[arg(long, default_value = "all_day", value_parser = parse_feed_type)]
    pub feed: FeedType,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Page to print, starting at 1 (out-of-range values are clamped)
    #[arg(long, default_value = "1", allow_hyphen_values = true)]
    pub page: i64,

    /// Rows per page
    #[arg(long, default_value_t = PAGE_SIZE)]
    pub page_size: usize,

    /// Minimum magnitude to show
    #[arg(long, value_parser = parse_non_negative)]
    pub min_magnitude: Option<f64>,

    /// Only show events within this many km
    #[arg(long, value_parser = parse_non_negative)]
    pub radius: Option<f64>,

    /// Time display: local, utc, or gmt+N / gmt-N
    #[arg(long, default_value = "local", value_parser = parse_time_display)]
    pub time: TimeDisplay,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse a feed type from string.
fn parse_feed_type(s: &str) -> Result<FeedType, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

fn parse_time_display(s: &str) -> Result<TimeDisplay, String> {
    s.parse()
}
