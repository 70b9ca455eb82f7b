//! Terminal output for a dashboard page.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use serde::Serialize;

use crate::dashboard::{DashboardView, TimeDisplay};
use crate::normalize::{MagnitudeTier, NormalizedEvent};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Tier colors
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const GREEN: &str = "\x1b[92m";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// Serialized shape of one row.
#[derive(Debug, Clone, Serialize)]
pub struct OutputEvent {
    pub id: String,
    pub time: String,
    pub time_utc: String,
    pub magnitude: f64,
    pub tier: MagnitudeTier,
    pub place: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: Option<f64>,
    pub distance_km: f64,
}

impl OutputEvent {
    #[must_use]
    pub fn new(event: &NormalizedEvent, display: TimeDisplay) -> Self {
        Self {
            id: event.id.clone(),
            time: display.format(event),
            time_utc: event.time_utc.to_rfc3339(),
            magnitude: event.magnitude,
            tier: event.tier,
            place: event.place.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            depth_km: event.depth_km,
            distance_km: (event.distance_km * 10.0).round() / 10.0,
        }
    }
}

fn tier_color(tier: MagnitudeTier) -> &'static str {
    match tier {
        MagnitudeTier::High => RED,
        MagnitudeTier::Medium => YELLOW,
        MagnitudeTier::Low => GREEN,
    }
}

/// Write the page as a colored table with a header and footer line.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, view: &DashboardView) -> io::Result<()> {
    let display = view.settings.time_display;
    let zone = display.zone_label(view.location.as_ref());

    if let Some(location) = &view.location {
        writeln!(
            writer,
            "{BOLD}Earthquakes near {}{RESET} {DIM}({:.2}, {:.2}) · {} · times in {zone}{RESET}",
            location.label,
            location.latitude,
            location.longitude,
            view.feed.label()
        )?;
    }

    for notice in &view.notices {
        writeln!(writer, "{YELLOW}! {}{RESET}", notice.message)?;
    }

    if view.page.events.is_empty() {
        if view.error().is_none() {
            writeln!(writer, "{DIM}No earthquake events found in this range.{RESET}")?;
        }
        return Ok(());
    }

    for event in &view.page.events {
        let color = tier_color(event.tier);
        writeln!(
            writer,
            "{} │ {color}{BOLD}M{:>4.1}{RESET} │ {:>7.2} {:>8.2} │ {DIM}{:>7.1} km{RESET} │ {}",
            display.format(event),
            event.magnitude,
            event.latitude,
            event.longitude,
            event.distance_km,
            event.place
        )?;
    }

    writeln!(
        writer,
        "{DIM}Page {}/{} · {} shown of {} fetched{RESET}",
        view.page.page_index + 1,
        view.page.total_pages,
        view.markers.len(),
        view.total_fetched
    )
}

/// Write the page as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, view: &DashboardView) -> io::Result<()> {
    let display = view.settings.time_display;
    let output: Vec<OutputEvent> = view
        .page
        .events
        .iter()
        .map(|e| OutputEvent::new(e, display))
        .collect();
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write the page as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, view: &DashboardView) -> io::Result<()> {
    let display = view.settings.time_display;
    for event in &view.page.events {
        let json = serde_json::to_string(&OutputEvent::new(event, display))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write the page in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_page<W: Write>(writer: &mut W, view: &DashboardView, format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, view),
        Format::Json => write_json(writer, view),
        Format::Ndjson => write_ndjson(writer, view),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::client::FeedType;
    use crate::dashboard::Settings;
    use crate::geo::LocationMode;
    use crate::normalize::normalize;
    use crate::normalize::tests::{location, raw};
    use crate::paginate::paginate;

    fn view() -> DashboardView {
        let events = normalize(
            &[raw("a", Some(5.5), 2_000), raw("b", Some(1.26), 1_000)],
            &location("UTC"),
        );
        DashboardView {
            location: Some(location("UTC")),
            mode: LocationMode::default(),
            feed: FeedType::AllDay,
            settings: Settings::default(),
            page: paginate(&events, 0, 10),
            markers: events,
            total_fetched: 2,
            notices: Vec::new(),
            alerts: Vec::new(),
            rendered_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("human".parse::<Format>(), Ok(Format::Human));
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!("ndjson".parse::<Format>(), Ok(Format::Ndjson));
        assert!("invalid".parse::<Format>().is_err());
    }

    #[test]
    fn test_ndjson_one_line_per_event() {
        let mut out = Vec::new();
        write_page(&mut out, &view(), Format::Ndjson).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["id"], "a");
        assert_eq!(first["tier"], "high");
        assert_eq!(first["time"], "1970-01-01 00:00:02");
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["magnitude"], 1.3);
    }

    #[test]
    fn test_human_empty_state() {
        let mut empty = view();
        empty.page = paginate(&[], 0, 10);
        let mut out = Vec::new();
        write_human(&mut out, &empty).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("No earthquake events found"));
    }
}
