//! QuakeWatch - Location-aware earthquake dashboard.
//!
//! Resolves where the user is, pulls the USGS summary feeds, and shows
//! nearby events in local time as a web dashboard or a one-shot table.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

mod alerts;
mod cli;
mod client;
mod dashboard;
mod errors;
mod filters;
mod geo;
mod models;
mod normalize;
mod output;
mod paginate;
mod render;
mod server;

use cli::{Cli, Command};
use client::UsgsClient;
use dashboard::{Dashboard, Interaction, NoticeKind, Session, Settings};
use filters::DisplayFilter;
use geo::{GeolocationResolver, HttpLocationLookup, PolygonTimezoneFinder};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Ui(args) => cmd_ui(args),
        Command::Tail(args) => cmd_tail(args),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Wire the production collaborators.
fn build_dashboard() -> Result<Dashboard> {
    let lookup = HttpLocationLookup::new().context("failed to create geolocation client")?;
    let resolver = GeolocationResolver::new(Box::new(lookup), Box::new(PolygonTimezoneFinder::new()));
    let client = UsgsClient::new().context("failed to create USGS client")?;
    Ok(Dashboard::new(resolver, Box::new(client)))
}

/// Execute the `tail` command - one page of nearby earthquakes.
fn cmd_tail(args: cli::TailArgs) -> Result<()> {
    let dashboard = build_dashboard()?;

    let settings = Settings {
        time_display: args.time,
        filter: DisplayFilter {
            min_magnitude: args.min_magnitude,
            max_distance_km: args.radius,
        },
        page_size: args.page_size,
        ..Settings::default()
    };
    let mut session = Session::new(args.location.mode(), args.feed, settings);

    let loaded = dashboard.handle(&mut session, Interaction::Load);
    if let Some(notice) = loaded.error() {
        match notice.kind {
            NoticeKind::LocationFailed => anyhow::bail!("failed to resolve location: {}", notice.message),
            NoticeKind::FetchFailed => anyhow::bail!("failed to fetch earthquake feed: {}", notice.message),
            NoticeKind::InvalidInput | NoticeKind::TimezoneFallback => {}
        }
    }

    let view = dashboard.handle(&mut session, Interaction::JumpPage(args.page.saturating_sub(1)));

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_page(&mut handle, &view, args.format)?;

    Ok(())
}

/// Execute the `ui` command - start web server.
fn cmd_ui(args: cli::UiArgs) -> Result<()> {
    let refresh_secs = args.refresh_secs();
    if refresh_secs != args.refresh {
        tracing::warn!("refresh interval clamped to {}s", refresh_secs);
    }

    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        refresh_secs,
        initial_mode: args.location.mode(),
        feed_type: args.feed,
        settings: Settings::default(),
    };

    // Built outside the runtime; the blocking HTTP clients must not be
    // dropped inside it.
    let dashboard = Arc::new(build_dashboard()?);

    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 QuakeWatch\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:    \x1b[96m{url}\x1b[0m");
    println!("  Feed:     {}", args.feed.label());
    if refresh_secs == 0 {
        println!("  Refresh:  off");
    } else {
        println!("  Refresh:  {refresh_secs}s");
    }
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    let result = tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(Arc::clone(&dashboard), config));

    drop(dashboard);
    result
}
