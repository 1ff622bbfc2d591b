mod app;
mod export;
mod feeds;
mod ingest;
mod retention;
mod stats;
mod store;
mod web;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skywatch_core::config::load_config;
use skywatch_core::geo::{bearing_deg, distance_nm, GeoBounds};
use skywatch_core::types::{format_flight_level, format_timestamp, Error, Result};

use crate::app::{App, HealthStatus};
use crate::export::{ExportFormat, ExportRequest};

#[derive(Parser)]
#[command(name = "skywatch", about = "ADS-B aircraft tracking service", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, default_value = "skywatch.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest loop and dashboard API.
    Start,
    /// Export stored positions to a file.
    Export {
        /// Output format: json, csv, or geojson.
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Start date, YYYY-MM-DD.
        #[arg(long)]
        start: Option<String>,
        /// End date, YYYY-MM-DD (defaults to start + 1 day).
        #[arg(long)]
        end: Option<String>,
        /// Geographic filter: south,west,north,east.
        #[arg(long)]
        bounds: Option<String>,
        /// Output path (defaults to a timestamped name).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show daily statistics.
    Stats {
        /// Days of history to include.
        #[arg(short, long, default_value_t = 7)]
        days: i64,
        /// Show currently active aircraft instead.
        #[arg(long)]
        current: bool,
    },
    /// Probe component health.
    Health,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!(error = %err, "command failed");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let app = Arc::new(App::new(config)?);

    match cli.command {
        Commands::Start => cmd_start(app),
        Commands::Export {
            format,
            start,
            end,
            bounds,
            output,
        } => cmd_export(&app, &format, start, end, bounds, output),
        Commands::Stats { days, current } => cmd_stats(&app, days, current),
        Commands::Health => cmd_health(&app),
    }
}

fn cmd_start(app: Arc<App>) -> Result<()> {
    app.start();

    let host = app.config.dashboard.host.clone();
    let port = app.config.dashboard.port;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        tokio::select! {
            res = web::serve(Arc::clone(&app), &host, port) => res,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                Ok(())
            }
        }
    });

    app.stop();
    result.map_err(Error::Io)
}

fn cmd_export(
    app: &App,
    format: &str,
    start: Option<String>,
    end: Option<String>,
    bounds: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let start = start.as_deref().map(parse_day).transpose()?;
    let end = match end.as_deref().map(parse_day).transpose()? {
        Some(end) => Some(end),
        None => start.map(|s| s + TimeDelta::days(1)),
    };
    let bounds = bounds.as_deref().map(GeoBounds::from_str).transpose()?;

    let req = ExportRequest {
        format: format.parse::<ExportFormat>()?,
        start,
        end,
        bounds,
        output,
    };
    let path = app.export(&req)?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_stats(app: &App, days: i64, current: bool) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    if current {
        let window = TimeDelta::seconds(app.config.ingest.active_window_seconds as i64);
        let aircraft = app.get_current(window)?;
        // Range and bearing are relative to the configured receiver location.
        let (center_lat, center_lon) = (app.config.feed.center_lat, app.config.feed.center_lon);
        table.set_header(["ICAO", "Callsign", "Position", "Altitude", "Speed", "Range", "Last seen"]);
        for a in &aircraft {
            let r = &a.report;
            table.add_row([
                a.icao_hex(),
                r.callsign.clone().unwrap_or_else(|| "-".into()),
                match r.position {
                    Some((lat, lon)) => format!("{lat:.4}, {lon:.4}"),
                    None => "-".into(),
                },
                format_flight_level(r.altitude),
                r.ground_speed
                    .map(|s| format!("{s:.0} kt"))
                    .unwrap_or_else(|| "-".into()),
                match r.position {
                    Some((lat, lon)) => format!(
                        "{:.1} nm @ {:03.0}°",
                        distance_nm(center_lat, center_lon, lat, lon),
                        bearing_deg(center_lat, center_lon, lat, lon),
                    ),
                    None => "-".into(),
                },
                format_timestamp(a.last_seen),
            ]);
        }
        println!("{table}");
        println!("{} active aircraft", aircraft.len());
        return Ok(());
    }

    let rows = app.get_statistics(days)?;
    table.set_header(["Date", "Aircraft", "Positions", "Callsigns", "Avg alt", "Max alt"]);
    for s in &rows {
        table.add_row([
            s.date.date_naive().to_string(),
            s.total_aircraft.to_string(),
            s.total_positions.to_string(),
            s.unique_callsigns.to_string(),
            s.avg_altitude
                .map(|a| format!("{a:.0} ft"))
                .unwrap_or_else(|| "-".into()),
            s.max_altitude
                .map(|a| format!("{a} ft"))
                .unwrap_or_else(|| "-".into()),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn cmd_health(app: &App) -> Result<()> {
    let health = app.health();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Component", "Status", "Detail"]);
    for c in &health.components {
        table.add_row([
            c.name.to_string(),
            format!("{:?}", c.status).to_lowercase(),
            c.message.clone().unwrap_or_else(|| "ok".into()),
        ]);
    }
    println!("{table}");

    if health.overall == HealthStatus::Degraded {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_day(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::Config(format!("invalid date (want YYYY-MM-DD): {s}")))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now))
}
