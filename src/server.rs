//! Web server for the QuakeWatch dashboard.
//!
//! Provides a location-aware earthquake dashboard using:
//! - Axum for HTTP server
//! - HTMX for dynamic UI without heavy JavaScript
//! - Leaflet for the map, inline SVG for the trend chart
//!
//! The server holds a single session. Each request is one synchronous
//! pipeline pass on the blocking pool; the session mutex keeps passes
//! serial.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Form, Router,
    extract::State,
    response::Html,
    routing::{get, post},
};
use serde::Deserialize;

use crate::alerts::DEFAULT_ALERT_MAGNITUDE;
use crate::client::FeedType;
use crate::dashboard::{Dashboard, DashboardView, Interaction, Notice, NoticeKind, Session, Settings};
use crate::filters::{DisplayFilter, parse_non_negative};
use crate::geo::LocationMode;
use crate::paginate::{PAGE_SIZE, PAGE_SIZE_OPTIONS};
use crate::render::{escape_html, render_dashboard};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Browser-driven auto refresh; 0 disables it
    pub refresh_secs: u64,
    pub initial_mode: LocationMode,
    pub feed_type: FeedType,
    pub settings: Settings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            refresh_secs: 60,
            initial_mode: LocationMode::AutoIp,
            feed_type: FeedType::AllDay,
            settings: Settings::default(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    dashboard: Arc<Dashboard>,
    session: Arc<Mutex<Session>>,
    config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(dashboard: Arc<Dashboard>, config: ServerConfig) -> Self {
        let session = Session::new(
            config.initial_mode.clone(),
            config.feed_type,
            config.settings,
        );
        Self {
            dashboard,
            session: Arc::new(Mutex::new(session)),
            config,
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/refresh", post(refresh_handler))
        .route("/page/next", post(next_page_handler))
        .route("/page/prev", post(prev_page_handler))
        .route("/page/jump", post(jump_page_handler))
        .route("/location", post(location_handler))
        .route("/feed", post(feed_handler))
        .route("/settings", post(settings_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or serving fails.
pub async fn run_server(dashboard: Arc<Dashboard>, config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = create_router(AppState::new(dashboard, config));

    tracing::info!("🌍 QuakeWatch UI starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run one interaction on the blocking pool and render the result.
///
/// `extra` is appended to the view's notices, for input errors caught
/// before the pipeline.
async fn run(state: &AppState, interaction: Interaction, extra: Option<Notice>) -> Html<String> {
    let dashboard = Arc::clone(&state.dashboard);
    let session = Arc::clone(&state.session);
    let refresh_secs = state.config.refresh_secs;

    let result = tokio::task::spawn_blocking(move || {
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let mut view: DashboardView = dashboard.handle(&mut session, interaction);
        view.notices.extend(extra);
        render_dashboard(&view, refresh_secs)
    })
    .await;

    match result {
        Ok(html) => Html(html),
        Err(e) => {
            tracing::error!("dashboard pass failed: {}", e);
            Html(format!(
                r#"<div class="notice notice-error">Internal error: {}</div>"#,
                escape_html(&e.to_string())
            ))
        }
    }
}

/// Notice for form input that never reached the pipeline.
fn invalid_input(message: String) -> Notice {
    Notice {
        kind: NoticeKind::InvalidInput,
        message,
    }
}

/// Re-render the current state with an input error attached.
async fn reject(state: &AppState, message: String) -> Html<String> {
    tracing::debug!("rejected input: {}", message);
    run(state, Interaction::Load, Some(invalid_input(message))).await
}

// ============================================================================
// Form parsing
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LocationForm {
    pub mode: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
}

impl LocationForm {
    /// # Errors
    ///
    /// Returns a message for an unknown mode or unparseable coordinates.
    pub fn parse(&self) -> Result<LocationMode, String> {
        match self.mode.as_str() {
            "auto" => Ok(LocationMode::AutoIp),
            "country" => Ok(LocationMode::Country(self.country.trim().to_string())),
            "manual" => {
                let lat = parse_coordinate("latitude", &self.lat)?;
                let lon = parse_coordinate("longitude", &self.lon)?;
                Ok(LocationMode::Manual { lat, lon })
            }
            other => Err(format!("unknown location mode: {other}")),
        }
    }
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("{name} must be a number, got '{value}'"))
}

#[derive(Debug, Deserialize)]
pub struct FeedForm {
    pub feed: String,
}

#[derive(Debug, Deserialize)]
pub struct JumpForm {
    pub page: String,
}

impl JumpForm {
    /// Convert the 1-based page number shown in the UI to an index.
    ///
    /// # Errors
    ///
    /// Returns a message if the input is not an integer.
    pub fn index(&self) -> Result<i64, String> {
        self.page
            .trim()
            .parse::<i64>()
            .map(|p| p.saturating_sub(1))
            .map_err(|_| format!("page must be a whole number, got '{}'", self.page))
    }
}

/// Settings form. Checkboxes are absent when unchecked.
#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub time: String,
    #[serde(default)]
    pub min_magnitude: String,
    #[serde(default)]
    pub radius_km: String,
    #[serde(default)]
    pub page_size: String,
    #[serde(default)]
    pub alert_magnitude: String,
    pub alert_sound: Option<String>,
    pub desktop_notify: Option<String>,
}

impl SettingsForm {
    /// # Errors
    ///
    /// Returns a message for the first invalid field.
    pub fn parse(&self) -> Result<Settings, String> {
        let optional = |s: &str| -> Result<Option<f64>, String> {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                parse_non_negative(s).map(Some)
            }
        };

        let page_size = match self.page_size.trim() {
            "" => PAGE_SIZE,
            s => s
                .parse::<usize>()
                .ok()
                .filter(|size| PAGE_SIZE_OPTIONS.contains(size))
                .ok_or_else(|| format!("page size must be one of {PAGE_SIZE_OPTIONS:?}, got '{s}'"))?,
        };

        let alert_magnitude = optional(&self.alert_magnitude)?.unwrap_or(DEFAULT_ALERT_MAGNITUDE);

        Ok(Settings {
            time_display: self.time.parse()?,
            filter: DisplayFilter {
                min_magnitude: optional(&self.min_magnitude)?,
                max_distance_km: optional(&self.radius_km)?,
            },
            page_size,
            alert_magnitude,
            alert_sound: self.alert_sound.is_some(),
            desktop_notify: self.desktop_notify.is_some(),
        })
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the HTML shell.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Initial render; fetches only if the session is empty.
async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    run(&state, Interaction::Load, None).await
}

async fn refresh_handler(State(state): State<AppState>) -> Html<String> {
    run(&state, Interaction::Refresh, None).await
}

async fn next_page_handler(State(state): State<AppState>) -> Html<String> {
    run(&state, Interaction::NextPage, None).await
}

async fn prev_page_handler(State(state): State<AppState>) -> Html<String> {
    run(&state, Interaction::PrevPage, None).await
}

async fn jump_page_handler(State(state): State<AppState>, Form(form): Form<JumpForm>) -> Html<String> {
    match form.index() {
        Ok(index) => run(&state, Interaction::JumpPage(index), None).await,
        Err(message) => reject(&state, message).await,
    }
}

async fn location_handler(
    State(state): State<AppState>,
    Form(form): Form<LocationForm>,
) -> Html<String> {
    match form.parse() {
        Ok(mode) => {
            tracing::info!("location changed to {:?}", mode);
            run(&state, Interaction::SetLocation(mode), None).await
        }
        Err(message) => reject(&state, message).await,
    }
}

async fn feed_handler(State(state): State<AppState>, Form(form): Form<FeedForm>) -> Html<String> {
    match form.feed.parse::<FeedType>() {
        Ok(feed) => run(&state, Interaction::SetFeed(feed), None).await,
        Err(message) => reject(&state, message).await,
    }
}

async fn settings_handler(
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Html<String> {
    match form.parse() {
        Ok(settings) => run(&state, Interaction::UpdateSettings(settings), None).await,
        Err(message) => reject(&state, message).await,
    }
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>QuakeWatch — Earthquake Monitor</title>

    <!-- HTMX -->
    <script src="https://unpkg.com/htmx.org@1.9.10"></script>

    <!-- Leaflet -->
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>

    <style>
        :root {
            --font: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif;
            --bg-primary: #ffffff;
            --bg-secondary: #f8fafc;
            --text-primary: #0f172a;
            --text-secondary: #475569;
            --border: #e2e8f0;
            --accent: #6366f1;
            --accent-hover: #4f46e5;
            --low: #10b981;
            --medium: #f59e0b;
            --high: #ef4444;
            --radius-md: 10px;
        }

        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            font-family: var(--font);
            background: var(--bg-secondary);
            color: var(--text-primary);
            line-height: 1.5;
        }

        .header {
            padding: 0.875rem 1.5rem;
            border-bottom: 1px solid var(--border);
            background: var(--bg-primary);
            font-weight: 600;
            font-size: 1.125rem;
        }

        .layout { display: grid; grid-template-columns: 300px 1fr; gap: 1.5rem; padding: 1.5rem; }
        .sidebar { display: flex; flex-direction: column; gap: 1rem; }
        .content { min-width: 0; }

        .card {
            display: flex;
            flex-direction: column;
            gap: 0.5rem;
            padding: 1rem;
            background: var(--bg-primary);
            border: 1px solid var(--border);
            border-radius: var(--radius-md);
        }
        .card h3 { font-size: 0.9rem; }
        .card label { font-size: 0.85rem; color: var(--text-secondary); }
        .card input[type=text], .card input[type=number], .card select { width: 100%; padding: 0.3rem; }
        .row { display: flex; gap: 0.5rem; }

        .btn {
            padding: 0.45rem 0.9rem;
            border-radius: var(--radius-md);
            font-size: 0.8125rem;
            cursor: pointer;
            border: 1px solid var(--border);
            background: transparent;
        }
        .btn-primary { background: var(--accent); color: white; border: none; }
        .btn-primary:hover { background: var(--accent-hover); }
        .btn[disabled] { opacity: 0.4; cursor: default; }

        .section-title { font-size: 1.4rem; }
        .section-subtitle { color: var(--text-secondary); font-size: 0.85rem; margin-bottom: 1rem; }

        .notice { padding: 0.75rem 1rem; border-radius: var(--radius-md); margin-bottom: 1rem; }
        .notice-error { background: #fee2e2; color: #991b1b; }
        .notice-warning { background: #fef3c7; color: #92400e; }

        .alerts { padding: 1rem; border-radius: var(--radius-md); background: #fef3c7; font-size: 0.85rem; }
        .alert-item { margin: 0.25rem 0; }
        .toast { margin-top: 0.5rem; font-weight: 600; }

        .pagination { display: flex; align-items: center; gap: 0.75rem; margin-bottom: 0.75rem; }
        .pagination form { display: flex; gap: 0.25rem; }
        .pagination input { width: 4rem; }
        .muted { color: var(--text-secondary); font-size: 0.8rem; }

        table.events { width: 100%; border-collapse: collapse; background: var(--bg-primary); font-size: 0.85rem; }
        table.events th, table.events td { padding: 0.4rem 0.6rem; border-bottom: 1px solid var(--border); text-align: left; }
        .mag { font-weight: 600; }
        .tier-low { color: var(--low); }
        .tier-medium { color: var(--medium); }
        .tier-high { color: var(--high); font-weight: 700; }

        .panels { display: grid; grid-template-columns: 2fr 1fr; gap: 1rem; margin-top: 1rem; }
        .panel { background: var(--bg-primary); border: 1px solid var(--border); border-radius: var(--radius-md); padding: 1rem; }
        .panel h2 { font-size: 1rem; margin-bottom: 0.5rem; }
        .map { height: 520px; border-radius: var(--radius-md); }
        .chart { width: 100%; height: auto; }

        .empty-state { text-align: center; padding: 4rem 1rem; color: var(--text-secondary); }
        .empty-icon { font-size: 2.5rem; }

        .footer { padding: 1.5rem; text-align: center; opacity: 0.6; font-size: 0.8rem; }

        @media (max-width: 900px) {
            .layout, .panels { grid-template-columns: 1fr; }
        }
    </style>
</head>
<body>
    <header class="header">🌍 QuakeWatch — Earthquake Monitor</header>

    <main id="dashboard" hx-get="/dashboard" hx-trigger="load" hx-swap="innerHTML">
        <div class="empty-state">
            <div class="empty-icon">◐</div>
            <p>Resolving location and fetching recent earthquakes...</p>
        </div>
    </main>

    <footer class="footer">
        Data © <a href="https://earthquake.usgs.gov/" target="_blank">USGS Earthquake Hazards Program</a> — feed latency can be 1 to several minutes.
    </footer>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FeedFetcher;
    use crate::dashboard::TimeDisplay;
    use crate::errors::FetchError;
    use crate::geo::tests::{StubLookup, stub_resolver};
    use crate::models::RawEvent;
    use crate::normalize::tests::raw;

    struct FixedFetcher;

    impl FeedFetcher for FixedFetcher {
        fn fetch_events(&self, _feed: FeedType) -> Result<Vec<RawEvent>, FetchError> {
            Ok(vec![raw("ev1", Some(3.2), 1_000), raw("ev2", Some(1.1), 2_000)])
        }
    }

    fn test_state() -> AppState {
        let dashboard = Dashboard::new(stub_resolver(StubLookup::default()), Box::new(FixedFetcher));
        let config = ServerConfig {
            refresh_secs: 0,
            initial_mode: LocationMode::Manual {
                lat: 40.71,
                lon: -74.01,
            },
            ..ServerConfig::default()
        };
        AppState::new(Arc::new(dashboard), config)
    }

    fn settings_form() -> SettingsForm {
        SettingsForm {
            time: "gmt+8".into(),
            min_magnitude: "2.5".into(),
            radius_km: String::new(),
            page_size: "20".into(),
            alert_magnitude: "5".into(),
            alert_sound: None,
            desktop_notify: Some("on".into()),
        }
    }

    #[test]
    fn test_location_form() {
        let form = LocationForm {
            mode: "manual".into(),
            country: String::new(),
            lat: "14.5995".into(),
            lon: " 120.9842".into(),
        };
        assert_eq!(
            form.parse(),
            Ok(LocationMode::Manual {
                lat: 14.5995,
                lon: 120.9842
            })
        );

        let form = LocationForm {
            mode: "manual".into(),
            country: String::new(),
            lat: "north".into(),
            lon: "0".into(),
        };
        assert!(form.parse().is_err());

        let form = LocationForm {
            mode: "country".into(),
            country: " jp ".into(),
            lat: String::new(),
            lon: String::new(),
        };
        assert_eq!(form.parse(), Ok(LocationMode::Country("jp".into())));
    }

    #[test]
    fn test_jump_form_is_one_based() {
        let form = JumpForm { page: "3".into() };
        assert_eq!(form.index(), Ok(2));
        let form = JumpForm { page: "0".into() };
        assert_eq!(form.index(), Ok(-1));
        assert!(JumpForm { page: "two".into() }.index().is_err());
    }

    #[test]
    fn test_settings_form() {
        let settings = settings_form().parse().expect("parse");
        assert_eq!(settings.time_display, TimeDisplay::GmtOffset(8));
        assert_eq!(settings.filter.min_magnitude, Some(2.5));
        assert_eq!(settings.filter.max_distance_km, None);
        assert_eq!(settings.page_size, 20);
        assert!((settings.alert_magnitude - 5.0).abs() < f64::EPSILON);
        assert!(!settings.alert_sound);
        assert!(settings.desktop_notify);
    }

    #[test]
    fn test_settings_form_rejects_bad_input() {
        let mut form = settings_form();
        form.radius_km = "-5".into();
        assert!(form.parse().is_err());

        let mut form = settings_form();
        form.time = "gmt+20".into();
        assert!(form.parse().is_err());
    }

    #[test]
    fn test_unlisted_page_size_rejected() {
        let mut form = settings_form();
        form.page_size = "7".into();
        assert!(form.parse().is_err());

        form.page_size = "ten".into();
        assert!(form.parse().is_err());

        form.page_size = String::new();
        assert_eq!(form.parse().map(|s| s.page_size), Ok(PAGE_SIZE));
    }

    #[tokio::test]
    async fn test_bad_location_form_keeps_current_view() {
        let state = test_state();
        let Html(before) = run(&state, Interaction::Load, None).await;
        assert!(before.contains("near ev1"));

        let form = LocationForm {
            mode: "manual".into(),
            country: String::new(),
            lat: "north".into(),
            lon: "0".into(),
        };
        let Html(after) = location_handler(State(state.clone()), Form(form)).await;
        assert!(after.contains("notice-error"));
        assert!(after.contains("latitude must be a number"));
        // events from the earlier load are still shown
        assert!(after.contains("near ev1"));

        let notice = invalid_input("bad".into());
        assert_eq!(notice.kind, NoticeKind::InvalidInput);
        assert!(notice.is_error());
    }
}
