//! Session state and the interaction handler.
//!
//! Every user interaction is one synchronous pass:
//! resolve location → fetch feed → normalize → filter → paginate.
//! Stages are skipped when their inputs have not changed. The pass never
//! fails; errors become [`Notice`]s on the returned view.

use std::str::FromStr;

use chrono::{FixedOffset, Utc};
use tracing::{debug, info, warn};

use crate::alerts::{DEFAULT_ALERT_MAGNITUDE, SeenRing, detect_alerts};
use crate::client::{FeedFetcher, FeedType};
use crate::filters::DisplayFilter;
use crate::geo::{GeolocationResolver, LocationMode, ResolvedLocation};
use crate::normalize::{NormalizedEvent, normalize};
use crate::paginate::{EventPage, PAGE_SIZE, Pager, paginate};

/// Which clock event times are shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeDisplay {
    /// The resolved location's timezone
    #[default]
    Local,
    Utc,
    /// Fixed offset from GMT in whole hours, -12 to +14
    GmtOffset(i32),
}

impl TimeDisplay {
    /// Format an event's time in this clock.
    #[must_use]
    pub fn format(self, event: &NormalizedEvent) -> String {
        const FMT: &str = "%Y-%m-%d %H:%M:%S";
        match self {
            Self::Local => event.time_local.format(FMT).to_string(),
            Self::Utc => event.time_utc.format(FMT).to_string(),
            Self::GmtOffset(hours) => FixedOffset::east_opt(hours * 3600).map_or_else(
                || event.time_utc.format(FMT).to_string(),
                |offset| event.time_utc.with_timezone(&offset).format(FMT).to_string(),
            ),
        }
    }

    /// Name of the clock, e.g. `Asia/Manila`, `UTC`, `GMT+8`.
    #[must_use]
    pub fn zone_label(self, location: Option<&ResolvedLocation>) -> String {
        match self {
            Self::Local => location.map_or_else(|| "UTC".to_string(), |l| l.timezone_name.clone()),
            Self::Utc => "UTC".to_string(),
            Self::GmtOffset(hours) => format!("GMT{hours:+}"),
        }
    }

    /// Form/CLI value, the inverse of `FromStr`.
    #[must_use]
    pub fn as_param(self) -> String {
        match self {
            Self::Local => "local".to_string(),
            Self::Utc => "utc".to_string(),
            Self::GmtOffset(hours) => format!("gmt{hours:+}"),
        }
    }
}

impl FromStr for TimeDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            _ => {
                let hours = s
                    .strip_prefix("gmt")
                    .and_then(|h| h.parse::<i32>().ok())
                    .ok_or_else(|| format!("unknown time display: {s} (expected local, utc, gmt+N)"))?;
                if !(-12..=14).contains(&hours) {
                    return Err(format!("GMT offset {hours} out of range [-12, 14]"));
                }
                Ok(Self::GmtOffset(hours))
            }
        }
    }
}

/// Presentation and filtering preferences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub time_display: TimeDisplay,
    pub filter: DisplayFilter,
    pub page_size: usize,
    pub alert_magnitude: f64,
    pub alert_sound: bool,
    pub desktop_notify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_display: TimeDisplay::default(),
            filter: DisplayFilter::default(),
            page_size: PAGE_SIZE,
            alert_magnitude: DEFAULT_ALERT_MAGNITUDE,
            alert_sound: true,
            desktop_notify: false,
        }
    }
}

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Feed could not be loaded; the list is empty
    FetchFailed,
    /// Location could not be resolved; nothing was fetched
    LocationFailed,
    /// Timezone unknown at the location; times shown in UTC
    TimezoneFallback,
    /// A form or argument could not be parsed; state unchanged
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self.kind, NoticeKind::TimezoneFallback)
    }
}

/// One user interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// First render; fetches only if nothing is loaded yet
    Load,
    Refresh,
    NextPage,
    PrevPage,
    JumpPage(i64),
    SetLocation(LocationMode),
    SetFeed(FeedType),
    UpdateSettings(Settings),
}

/// Per-session mutable state, owned by the caller.
///
/// Reset rule: any rebuild of the event list (new fetch, location change)
/// or filter/page-size change puts the pager back on page 0.
#[derive(Debug, Default)]
pub struct Session {
    mode: LocationMode,
    feed: FeedType,
    settings: Settings,
    /// Cached resolution and the mode it was computed for
    location: Option<(LocationMode, ResolvedLocation)>,
    /// Normalized, newest first
    events: Vec<NormalizedEvent>,
    /// `events` after the display filter
    visible: Vec<NormalizedEvent>,
    pager: Pager,
    seen: SeenRing,
    notices: Vec<Notice>,
    loaded: bool,
}

impl Session {
    #[must_use]
    pub fn new(mode: LocationMode, feed: FeedType, settings: Settings) -> Self {
        Self {
            mode,
            feed,
            settings,
            ..Self::default()
        }
    }

    fn resolved(&self) -> Option<&ResolvedLocation> {
        self.location.as_ref().map(|(_, l)| l)
    }

    fn refilter(&mut self) {
        self.visible = self.settings.filter.apply(&self.events);
    }

    fn total_pages(&self) -> usize {
        self.visible.len().div_ceil(self.page_size())
    }

    fn page_size(&self) -> usize {
        if self.settings.page_size == 0 {
            PAGE_SIZE
        } else {
            self.settings.page_size
        }
    }

    fn clear_events(&mut self) {
        self.events.clear();
        self.visible.clear();
        self.pager.reset();
    }

    fn view(&self, alerts: Vec<NormalizedEvent>) -> DashboardView {
        let page = paginate(
            &self.visible,
            i64::try_from(self.pager.index()).unwrap_or(i64::MAX),
            self.page_size(),
        );
        DashboardView {
            location: self.resolved().cloned(),
            mode: self.mode.clone(),
            feed: self.feed,
            settings: self.settings,
            page,
            markers: self.visible.clone(),
            total_fetched: self.events.len(),
            notices: self.notices.clone(),
            alerts,
            rendered_at: Utc::now(),
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub location: Option<ResolvedLocation>,
    pub mode: LocationMode,
    pub feed: FeedType,
    pub settings: Settings,
    /// Current page of the filtered list
    pub page: EventPage,
    /// The whole filtered list, for the map
    pub markers: Vec<NormalizedEvent>,
    /// Events in the feed before filtering
    pub total_fetched: usize,
    pub notices: Vec<Notice>,
    /// Newly seen events at or above the alert magnitude, newest first
    pub alerts: Vec<NormalizedEvent>,
    pub rendered_at: chrono::DateTime<Utc>,
}

impl DashboardView {
    /// First notice that stopped the pipeline, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Notice> {
        self.notices.iter().find(|n| n.is_error())
    }
}

/// The pipeline's collaborators.
pub struct Dashboard {
    resolver: GeolocationResolver,
    fetcher: Box<dyn FeedFetcher>,
}

impl Dashboard {
    #[must_use]
    pub fn new(resolver: GeolocationResolver, fetcher: Box<dyn FeedFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    /// Apply one interaction to `session` and return the view to render.
    pub fn handle(&self, session: &mut Session, interaction: Interaction) -> DashboardView {
        debug!("handling {:?}", interaction);
        let mut alerts = Vec::new();

        match interaction {
            Interaction::Load => {
                if !session.loaded {
                    alerts = self.rebuild(session);
                }
            }
            Interaction::Refresh => alerts = self.rebuild(session),
            Interaction::SetFeed(feed) => {
                session.feed = feed;
                alerts = self.rebuild(session);
            }
            Interaction::SetLocation(mode) => {
                session.mode = mode;
                alerts = self.rebuild(session);
            }
            Interaction::NextPage => {
                let total = session.total_pages();
                session.pager.next(total);
            }
            Interaction::PrevPage => session.pager.prev(),
            Interaction::JumpPage(index) => {
                let total = session.total_pages();
                session.pager.jump(index, total);
            }
            Interaction::UpdateSettings(settings) => {
                let relist = settings.filter != session.settings.filter
                    || settings.page_size != session.settings.page_size;
                session.settings = settings;
                if relist {
                    session.refilter();
                    session.pager.reset();
                }
            }
        }

        session.view(alerts)
    }

    /// Resolve (if needed), fetch, normalize and filter. Returns alerts.
    fn rebuild(&self, session: &mut Session) -> Vec<NormalizedEvent> {
        session.loaded = true;
        session.notices.clear();

        let location = match self.location(session) {
            Ok(location) => location,
            Err(message) => {
                session.clear_events();
                session.notices.push(Notice {
                    kind: NoticeKind::LocationFailed,
                    message,
                });
                return Vec::new();
            }
        };

        if location.timezone_fallback {
            session.notices.push(Notice {
                kind: NoticeKind::TimezoneFallback,
                message: format!(
                    "No timezone found for {}; showing times in UTC",
                    location.label
                ),
            });
        }

        match self.fetcher.fetch_events(session.feed) {
            Ok(raw) => {
                session.events = normalize(&raw, &location);
                info!(
                    "loaded {} of {} events from {} near {}",
                    session.events.len(),
                    raw.len(),
                    session.feed.as_str(),
                    location.label
                );
            }
            Err(e) => {
                warn!("feed fetch failed: {e}");
                session.events.clear();
                session.notices.push(Notice {
                    kind: NoticeKind::FetchFailed,
                    message: format!("Could not load earthquake feed: {e}"),
                });
            }
        }

        session.refilter();
        session.pager.reset();
        detect_alerts(
            &mut session.seen,
            &session.visible,
            session.settings.alert_magnitude,
        )
    }

    /// Cached location for the current mode, resolving on a miss.
    fn location(&self, session: &mut Session) -> Result<ResolvedLocation, String> {
        if let Some((mode, location)) = &session.location {
            if *mode == session.mode {
                return Ok(location.clone());
            }
        }

        session.location = None;
        match self.resolver.resolve(&session.mode) {
            Ok(location) => {
                session.location = Some((session.mode.clone(), location.clone()));
                Ok(location)
            }
            Err(e) => {
                warn!("location resolution failed: {e}");
                Err(format!("Could not determine location: {e}"))
            }
        }
    }
}
