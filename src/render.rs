//! HTML rendering of a [`DashboardView`].
//!
//! Produces the fragment HTMX swaps into `#dashboard`: controls, notices,
//! alerts, the paginated table, a Leaflet map of every filtered event and
//! an SVG magnitude trend of the current page only.

use serde::Serialize;

use crate::client::FeedType;
use crate::dashboard::{DashboardView, TimeDisplay};
use crate::geo::LocationMode;
use crate::normalize::{MagnitudeTier, NormalizedEvent};
use crate::paginate::PAGE_SIZE_OPTIONS;

/// How many alerts are listed individually.
const MAX_LISTED_ALERTS: usize = 3;

/// HTMX attributes that swap a response into the dashboard container.
const SWAP: &str = r##"hx-target="#dashboard" hx-swap="innerHTML""##;

const CHART_WIDTH: f64 = 480.0;
const CHART_HEIGHT: f64 = 280.0;
const CHART_PAD: f64 = 36.0;

/// Escape text for HTML element content and quoted attributes.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Marker color for a tier.
#[must_use]
pub const fn tier_color(tier: MagnitudeTier) -> &'static str {
    match tier {
        MagnitudeTier::Low => "#10b981",
        MagnitudeTier::Medium => "#f59e0b",
        MagnitudeTier::High => "#ef4444",
    }
}

/// Places sharing each whole-hour GMT offset, for the offset selector.
#[must_use]
pub const fn gmt_reference(offset: i32) -> &'static str {
    match offset {
        -12 => "Baker Island",
        -11 => "American Samoa",
        -10 => "Hawaii",
        -9 => "Alaska",
        -8 => "Los Angeles, Vancouver",
        -7 => "Denver, Phoenix",
        -6 => "Chicago, Mexico City",
        -5 => "New York, Peru, Colombia",
        -4 => "Santiago, Caracas",
        -3 => "Buenos Aires, São Paulo",
        -2 => "South Georgia",
        -1 => "Azores",
        0 => "London, Lisbon, Accra",
        1 => "Berlin, Paris, Madrid",
        2 => "Athens, Cairo, Johannesburg",
        3 => "Moscow, Nairobi",
        4 => "Dubai, Baku",
        5 => "Pakistan, Maldives",
        6 => "Bangladesh, Kazakhstan",
        7 => "Thailand, Vietnam, Jakarta",
        8 => "China, Singapore, Philippines",
        9 => "Japan, Korea",
        10 => "Sydney, Papua New Guinea",
        11 => "Solomon Islands",
        12 => "Fiji, New Zealand",
        13 => "Samoa, Tonga",
        14 => "Kiribati",
        _ => "",
    }
}

/// One map marker, serialized into the Leaflet script.
///
/// Leaflet renders tooltip strings as HTML, so `tooltip` is pre-escaped.
#[derive(Debug, Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    radius: f64,
    color: &'static str,
    tooltip: String,
}

impl Marker {
    fn new(event: &NormalizedEvent, display: TimeDisplay) -> Self {
        Self {
            lat: event.latitude,
            lon: event.longitude,
            // grows with magnitude; floor keeps negative magnitudes visible
            radius: (4.0 + event.magnitude).max(2.0),
            color: tier_color(event.tier),
            tooltip: format!(
                "M{:.1} {} • {}",
                event.magnitude,
                escape_html(&event.place),
                display.format(event)
            ),
        }
    }
}

/// Render the full dashboard fragment.
///
/// `refresh_secs` of 0 disables the auto-refresh trigger.
#[must_use]
pub fn render_dashboard(view: &DashboardView, refresh_secs: u64) -> String {
    let mut html = String::new();

    if refresh_secs > 0 {
        html.push_str(&format!(
            r#"<div hx-post="/refresh" hx-trigger="every {refresh_secs}s" {SWAP}></div>"#
        ));
    }

    html.push_str(r#"<div class="layout"><aside class="sidebar">"#);
    html.push_str(&render_location_form(view));
    html.push_str(&render_feed_form(view.feed));
    html.push_str(&render_settings_form(view));
    html.push_str(&render_alerts(view));
    html.push_str("</aside><section class=\"content\">");

    html.push_str(&render_notices(view));

    let heading = view
        .location
        .as_ref()
        .map_or_else(|| "Earthquake events".to_string(), |l| {
            format!("Earthquake events near {}", escape_html(&l.label))
        });
    html.push_str(&format!(
        r#"<div class="section-header"><h1 class="section-title">{heading}</h1><p class="section-subtitle">{} · times in {} · updated {}</p></div>"#,
        escape_html(view.feed.label()),
        escape_html(&view.settings.time_display.zone_label(view.location.as_ref())),
        view.rendered_at.format("%H:%M:%S UTC"),
    ));

    if view.page.events.is_empty() {
        if view.error().is_none() {
            html.push_str(
                r#"<div class="empty-state"><div class="empty-icon">🌍</div><p class="empty-title">No earthquake events found in this range.</p></div>"#,
            );
        }
    } else {
        html.push_str(&render_pagination(view));
        html.push_str(&render_table(view));
        html.push_str(r#"<div class="panels"><div class="panel panel-map"><h2>Map</h2>"#);
        html.push_str(&render_map(view));
        html.push_str(r#"</div><div class="panel panel-chart"><h2>Magnitude Trend (page)</h2>"#);
        html.push_str(&render_chart(&view.page.events, view.settings.time_display));
        html.push_str("</div></div>");
    }

    html.push_str("</section></div>");
    html
}

fn render_notices(view: &DashboardView) -> String {
    view.notices
        .iter()
        .map(|n| {
            let class = if n.is_error() { "notice notice-error" } else { "notice notice-warning" };
            format!(r#"<div class="{class}">{}</div>"#, escape_html(&n.message))
        })
        .collect()
}

fn render_alerts(view: &DashboardView) -> String {
    if view.alerts.is_empty() {
        return String::new();
    }

    let display = view.settings.time_display;
    let mut html = String::from(r#"<div class="alerts"><h3>🚨 New earthquakes</h3>"#);
    for event in view.alerts.iter().take(MAX_LISTED_ALERTS) {
        html.push_str(&format!(
            r#"<div class="alert-item">New quake M{:.1} • {} • {} • {:.0} km</div>"#,
            event.magnitude,
            escape_html(&event.place),
            display.format(event),
            event.distance_km
        ));
    }
    html.push_str(&format!(
        r#"<div class="toast">⚠️ {} new earthquake(s) ≥ M{:.1} detected</div></div>"#,
        view.alerts.len(),
        view.settings.alert_magnitude
    ));

    if view.settings.alert_sound {
        html.push_str(BEEP_SCRIPT);
    }
    if view.settings.desktop_notify {
        if let Some(first) = view.alerts.first() {
            let title = js_string("New earthquake detected");
            let body = js_string(&format!(
                "M{:.1} • {} • {}",
                first.magnitude,
                first.place,
                display.format(first)
            ));
            html.push_str(&format!(
                "<script>try{{if(window.Notification&&Notification.permission!=='granted'){{Notification.requestPermission();}}\
                 if(window.Notification&&Notification.permission==='granted'){{new Notification({title},{{body:{body}}});}}}}catch(e){{}}</script>"
            ));
        }
    }
    html
}

/// JSON-encode a string for inline scripts, keeping `</script>` inert.
fn js_string(s: &str) -> String {
    serde_json::to_string(s)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

fn render_location_form(view: &DashboardView) -> String {
    let (auto, country, manual) = match &view.mode {
        LocationMode::AutoIp => ("checked", "", ""),
        LocationMode::Country(_) => ("", "checked", ""),
        LocationMode::Manual { .. } => ("", "", "checked"),
    };
    let code = match &view.mode {
        LocationMode::Country(code) => escape_html(code),
        _ => String::new(),
    };
    let (lat, lon) = match (&view.mode, &view.location) {
        (LocationMode::Manual { lat, lon }, _) => (*lat, *lon),
        (_, Some(l)) => (l.latitude, l.longitude),
        (_, None) => (0.0, 0.0),
    };

    format!(
        r#"<form class="card" hx-post="/location" {SWAP}>
  <h3>📍 Location</h3>
  <label><input type="radio" name="mode" value="auto" {auto}> Auto IP</label>
  <label><input type="radio" name="mode" value="country" {country}> Country</label>
  <input type="text" name="country" value="{code}" placeholder="ISO code, e.g. PH" maxlength="2">
  <label><input type="radio" name="mode" value="manual" {manual}> Manual</label>
  <div class="row">
    <input type="number" name="lat" value="{lat:.4}" step="0.0001" min="-90" max="90">
    <input type="number" name="lon" value="{lon:.4}" step="0.0001" min="-180" max="180">
  </div>
  <button class="btn btn-primary" type="submit">Apply</button>
</form>"#
    )
}

fn render_feed_form(current: FeedType) -> String {
    let options: String = FeedType::ALL
        .iter()
        .map(|feed| {
            let selected = if *feed == current { " selected" } else { "" };
            format!(
                r#"<option value="{}"{selected}>{}</option>"#,
                feed.as_str(),
                escape_html(feed.label())
            )
        })
        .collect();

    format!(
        r#"<form class="card" hx-post="/feed" {SWAP} hx-trigger="change">
  <h3>🌐 USGS Feed</h3>
  <select name="feed">{options}</select>
  <button class="btn btn-ghost" type="button" hx-post="/refresh" {SWAP}>⟳ Refresh</button>
</form>"#
    )
}

fn render_settings_form(view: &DashboardView) -> String {
    let settings = &view.settings;
    let current_time = settings.time_display.as_param();

    let mut time_options = String::new();
    for (value, label) in [("local", "Local Time".to_string()), ("utc", "UTC".to_string())] {
        let selected = if current_time == value { " selected" } else { "" };
        time_options.push_str(&format!(r#"<option value="{value}"{selected}>{label}</option>"#));
    }
    for offset in -12..=14 {
        let value = TimeDisplay::GmtOffset(offset).as_param();
        let selected = if current_time == value { " selected" } else { "" };
        time_options.push_str(&format!(
            r#"<option value="{value}"{selected}>GMT{offset:+} ({})</option>"#,
            escape_html(gmt_reference(offset))
        ));
    }

    let page_options: String = PAGE_SIZE_OPTIONS
        .iter()
        .map(|size| {
            let selected = if *size == settings.page_size { " selected" } else { "" };
            format!(r#"<option value="{size}"{selected}>{size}</option>"#)
        })
        .collect();

    let min_mag = settings
        .filter
        .min_magnitude
        .map(|m| format!("{m}"))
        .unwrap_or_default();
    let radius = settings
        .filter
        .max_distance_km
        .map(|r| format!("{r}"))
        .unwrap_or_default();
    let sound = if settings.alert_sound { "checked" } else { "" };
    let desktop = if settings.desktop_notify { "checked" } else { "" };

    format!(
        r#"<form class="card" hx-post="/settings" {SWAP}>
  <h3>⚙️ Display</h3>
  <label>Show times as <select name="time">{time_options}</select></label>
  <label>Minimum magnitude <input type="number" name="min_magnitude" value="{min_mag}" step="0.1" min="0"></label>
  <label>Radius (km) <input type="number" name="radius_km" value="{radius}" step="50" min="0"></label>
  <label>Rows <select name="page_size">{page_options}</select></label>
  <h3>🚨 Alerts</h3>
  <label>Alert when magnitude ≥ <input type="number" name="alert_magnitude" value="{:.1}" step="0.1" min="0"></label>
  <label><input type="checkbox" name="alert_sound" value="on" {sound}> Play sound on alert</label>
  <label><input type="checkbox" name="desktop_notify" value="on" {desktop}> Desktop notification</label>
  <button class="btn btn-primary" type="submit">Apply</button>
</form>"#,
        settings.alert_magnitude
    )
}

fn render_pagination(view: &DashboardView) -> String {
    let page = &view.page;
    let prev = if page.has_prev() { "" } else { " disabled" };
    let next = if page.has_next() { "" } else { " disabled" };
    format!(
        r#"<div class="pagination">
  <button class="btn btn-ghost" hx-post="/page/prev" {SWAP}{prev}>⬅ Prev</button>
  <span>Page {}/{}</span>
  <button class="btn btn-ghost" hx-post="/page/next" {SWAP}{next}>Next ➡</button>
  <form hx-post="/page/jump" {SWAP}>
    <input type="number" name="page" min="1" max="{}" value="{}">
    <button class="btn btn-ghost" type="submit">Go</button>
  </form>
  <span class="muted">{} events shown of {} fetched</span>
</div>"#,
        page.page_index + 1,
        page.total_pages,
        page.total_pages,
        page.page_index + 1,
        view.markers.len(),
        view.total_fetched
    )
}

fn render_table(view: &DashboardView) -> String {
    let display = view.settings.time_display;
    let rows: String = view
        .page
        .events
        .iter()
        .map(|e| {
            format!(
                r#"<tr><td>{}</td><td class="mag tier-{}">{:.1}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.1}</td></tr>"#,
                display.format(e),
                e.tier.as_str(),
                e.magnitude,
                escape_html(&e.place),
                e.latitude,
                e.longitude,
                e.distance_km
            )
        })
        .collect();

    format!(
        r#"<table class="events"><thead><tr><th>Time</th><th>Magnitude</th><th>Place</th><th>Lat</th><th>Lon</th><th>Dist (km)</th></tr></thead><tbody>{rows}</tbody></table>"#
    )
}

fn render_map(view: &DashboardView) -> String {
    let display = view.settings.time_display;
    let markers: Vec<Marker> = view.markers.iter().map(|e| Marker::new(e, display)).collect();
    let markers_json = serde_json::to_string(&markers)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/");

    let (lat, lon, label) = view.location.as_ref().map_or((0.0, 0.0, String::new()), |l| {
        (l.latitude, l.longitude, format!("You: {}", escape_html(&l.label)))
    });
    let label = js_string(&label);

    format!(
        r#"<div id="quake-map" class="map"></div>
<script>
(function() {{
  var el = document.getElementById('quake-map');
  if (!el || typeof L === 'undefined') return;
  if (window.quakeMap) {{ window.quakeMap.remove(); }}
  var map = L.map('quake-map').setView([{lat}, {lon}], 4);
  L.tileLayer('https://{{s}}.basemaps.cartocdn.com/light_all/{{z}}/{{x}}/{{y}}{{r}}.png').addTo(map);
  L.marker([{lat}, {lon}]).bindTooltip({label}).addTo(map);
  {markers_json}.forEach(function(m) {{
    L.circleMarker([m.lat, m.lon], {{
      radius: m.radius,
      color: m.color,
      fillColor: m.color,
      fillOpacity: 0.7
    }}).bindTooltip(m.tooltip).addTo(map);
  }});
  window.quakeMap = map;
}})();
</script>"#
    )
}

/// SVG line chart of magnitude over time, oldest on the left.
#[must_use]
pub fn render_chart(events: &[NormalizedEvent], display: TimeDisplay) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut points: Vec<&NormalizedEvent> = events.iter().collect();
    points.sort_by_key(|e| e.time_utc);

    let t0 = points[0].time_utc.timestamp_millis();
    let t1 = points[points.len() - 1].time_utc.timestamp_millis();
    let m_lo = points.iter().map(|e| e.magnitude).fold(f64::INFINITY, f64::min).floor();
    let m_hi = points.iter().map(|e| e.magnitude).fold(f64::NEG_INFINITY, f64::max).ceil();
    let m_hi = if m_hi <= m_lo { m_lo + 1.0 } else { m_hi };

    let plot_w = CHART_WIDTH - 2.0 * CHART_PAD;
    let plot_h = CHART_HEIGHT - 2.0 * CHART_PAD;

    #[allow(clippy::cast_precision_loss)]
    let x = |t: i64| {
        if t1 == t0 {
            CHART_PAD + plot_w / 2.0
        } else {
            CHART_PAD + (t - t0) as f64 / (t1 - t0) as f64 * plot_w
        }
    };
    let y = |m: f64| CHART_PAD + (m_hi - m) / (m_hi - m_lo) * plot_h;

    let coords: Vec<(f64, f64)> = points
        .iter()
        .map(|e| (x(e.time_utc.timestamp_millis()), y(e.magnitude)))
        .collect();

    let polyline: Vec<String> = coords.iter().map(|(px, py)| format!("{px:.1},{py:.1}")).collect();
    let dots: String = coords
        .iter()
        .zip(&points)
        .map(|((px, py), e)| {
            format!(
                r#"<circle cx="{px:.1}" cy="{py:.1}" r="4" fill="{}"><title>M{:.1} {}</title></circle>"#,
                tier_color(e.tier),
                e.magnitude,
                escape_html(&display.format(e))
            )
        })
        .collect();

    let bottom = CHART_HEIGHT - CHART_PAD;
    let right = CHART_WIDTH - CHART_PAD;
    format!(
        r##"<svg class="chart" viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}" xmlns="http://www.w3.org/2000/svg" role="img">
  <line x1="{CHART_PAD}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="#94a3b8"/>
  <line x1="{CHART_PAD}" y1="{CHART_PAD}" x2="{CHART_PAD}" y2="{bottom}" stroke="#94a3b8"/>
  <text x="4" y="{CHART_PAD}" font-size="11">{m_hi:.1}</text>
  <text x="4" y="{bottom}" font-size="11">{m_lo:.1}</text>
  <text x="{CHART_PAD}" y="{}" font-size="11">{}</text>
  <text x="{right}" y="{}" font-size="11" text-anchor="end">{}</text>
  <polyline points="{}" fill="none" stroke="#6366f1" stroke-width="2" stroke-dasharray="0"/>
  {dots}
</svg>"##,
        bottom + 16.0,
        escape_html(&display.format(points[0])),
        bottom + 16.0,
        escape_html(&display.format(points[points.len() - 1])),
        polyline.join(" "),
    )
}

const BEEP_SCRIPT: &str = r"<script>
try {
  var ctx = new (window.AudioContext || window.webkitAudioContext)();
  var o = ctx.createOscillator();
  var g = ctx.createGain();
  o.type = 'sine';
  o.frequency.value = 880;
  o.connect(g);
  g.connect(ctx.destination);
  g.gain.setValueAtTime(0.0001, ctx.currentTime);
  g.gain.exponentialRampToValueAtTime(0.2, ctx.currentTime + 0.01);
  o.start();
  g.gain.exponentialRampToValueAtTime(0.0001, ctx.currentTime + 0.3);
  o.stop(ctx.currentTime + 0.35);
} catch (e) {}
</script>";
