//! Configuration for skywatch.
//!
//! Reads a small YAML subset (two-level `section: key: value` files) with
//! sections for the ingest loop, the feed, the database, and the dashboard.
//! Missing files and unknown keys fall back to defaults; the core
//! components receive an already-validated `Config` value and never read
//! global state.

use std::path::Path;

use crate::types::{Error, Result};

/// Full configuration structure.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
    pub dashboard: DashboardConfig,
}

/// Ingest loop cadence and staleness thresholds.
///
/// `cache_max_age_seconds` (live-table eviction) and
/// `active_window_seconds` (what counts as "currently active" for queries)
/// are deliberately independent knobs.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub tick_seconds: u64,
    pub cache_max_age_seconds: u64,
    pub active_window_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub stats_interval_seconds: u64,
    pub stop_timeout_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            tick_seconds: 5,
            cache_max_age_seconds: 300,
            active_window_seconds: 300,
            sweep_interval_seconds: 300,
            stats_interval_seconds: 3600,
            stop_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Synthetic,
    Network,
    Hardware,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub kind: FeedKind,
    /// dump1090-style aircraft.json endpoints (network feeds).
    pub urls: Vec<String>,
    /// External demodulator command line (hardware feed).
    pub command: Option<String>,
    /// Synthetic feed parameters.
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_nm: f64,
    pub aircraft: usize,
    /// Upper bound on a single poll, must stay below the tick interval.
    pub poll_timeout_seconds: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            kind: FeedKind::Synthetic,
            urls: Vec::new(),
            command: None,
            center_lat: 42.5,
            center_lon: -75.0,
            radius_nm: 50.0,
            aircraft: 10,
            poll_timeout_seconds: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub retention_positions_days: i64,
    pub retention_statistics_days: i64,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "data/skywatch.db".into(),
            retention_positions_days: 30,
            retention_statistics_days: 365,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// Load config from a file, falling back to defaults if it doesn't exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        match current_section.as_deref() {
            Some("ingest") => apply_ingest(&mut config.ingest, key, val)?,
            Some("feed") => apply_feed(&mut config.feed, key, val)?,
            Some("database") => apply_database(&mut config.database, key, val)?,
            Some("dashboard") => apply_dashboard(&mut config.dashboard, key, val)?,
            _ => {}
        }
    }

    Ok(config)
}

fn apply_ingest(cfg: &mut IngestConfig, key: &str, val: &str) -> Result<()> {
    let target = match key {
        "tick_seconds" => &mut cfg.tick_seconds,
        "cache_max_age_seconds" => &mut cfg.cache_max_age_seconds,
        "active_window_seconds" => &mut cfg.active_window_seconds,
        "sweep_interval_seconds" => &mut cfg.sweep_interval_seconds,
        "stats_interval_seconds" => &mut cfg.stats_interval_seconds,
        "stop_timeout_seconds" => &mut cfg.stop_timeout_seconds,
        _ => return Ok(()),
    };
    *target = parse_num(key, val)?;
    Ok(())
}

fn apply_feed(cfg: &mut FeedConfig, key: &str, val: &str) -> Result<()> {
    match key {
        "kind" => {
            cfg.kind = match unquote(val).as_str() {
                "synthetic" => FeedKind::Synthetic,
                "network" => FeedKind::Network,
                "hardware" => FeedKind::Hardware,
                other => return Err(Error::Config(format!("unknown feed kind: {other}"))),
            }
        }
        "urls" => {
            cfg.urls = unquote(val)
                .split(',')
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect()
        }
        "command" => cfg.command = non_null(val),
        "center_lat" => cfg.center_lat = parse_num(key, val)?,
        "center_lon" => cfg.center_lon = parse_num(key, val)?,
        "radius_nm" => cfg.radius_nm = parse_num(key, val)?,
        "aircraft" => cfg.aircraft = parse_num(key, val)?,
        "poll_timeout_seconds" => cfg.poll_timeout_seconds = parse_num(key, val)?,
        _ => {}
    }
    Ok(())
}

fn apply_database(cfg: &mut DatabaseConfig, key: &str, val: &str) -> Result<()> {
    match key {
        "path" => {
            if let Some(v) = non_null(val) {
                cfg.path = v;
            }
        }
        "retention_positions_days" => cfg.retention_positions_days = parse_num(key, val)?,
        "retention_statistics_days" => cfg.retention_statistics_days = parse_num(key, val)?,
        "busy_timeout_ms" => cfg.busy_timeout_ms = parse_num(key, val)?,
        _ => {}
    }
    Ok(())
}

fn apply_dashboard(cfg: &mut DashboardConfig, key: &str, val: &str) -> Result<()> {
    match key {
        "host" => {
            if let Some(v) = non_null(val) {
                cfg.host = v;
            }
        }
        "port" => cfg.port = parse_num(key, val)?,
        _ => {}
    }
    Ok(())
}

fn parse_num<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| Error::Config(format!("invalid value for {key}: {val}")))
}

fn unquote(val: &str) -> String {
    let v = val.trim();
    if (v.starts_with('"') && v.ends_with('"') && v.len() >= 2)
        || (v.starts_with('\'') && v.ends_with('\'') && v.len() >= 2)
    {
        v[1..v.len() - 1].to_string()
    } else {
        v.to_string()
    }
}

fn non_null(val: &str) -> Option<String> {
    let v = unquote(val);
    (!v.is_empty() && v != "null" && v != "~").then_some(v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.tick_seconds, 5);
        assert_eq!(config.ingest.cache_max_age_seconds, 300);
        assert_eq!(config.ingest.active_window_seconds, 300);
        assert_eq!(config.feed.kind, FeedKind::Synthetic);
        assert_eq!(config.database.retention_positions_days, 30);
        assert_eq!(config.database.retention_statistics_days, 365);
        assert_eq!(config.dashboard.port, 8080);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
# skywatch configuration
ingest:
  tick_seconds: 2
  cache_max_age_seconds: 120
  active_window_seconds: 600

feed:
  kind: network
  urls: "http://rx1:8080/data/aircraft.json, http://rx2:8080/data/aircraft.json"

database:
  path: "/tmp/test.db"
  retention_positions_days: 7

dashboard:
  host: "0.0.0.0"
  port: 9090
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.ingest.tick_seconds, 2);
        assert_eq!(config.ingest.cache_max_age_seconds, 120);
        assert_eq!(config.ingest.active_window_seconds, 600);
        assert_eq!(config.ingest.sweep_interval_seconds, 300); // default kept
        assert_eq!(config.feed.kind, FeedKind::Network);
        assert_eq!(config.feed.urls.len(), 2);
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.database.retention_positions_days, 7);
        assert_eq!(config.dashboard.host, "0.0.0.0");
        assert_eq!(config.dashboard.port, 9090);
    }

    #[test]
    fn test_parse_config_null_values() {
        let text = r#"
feed:
  kind: hardware
  command: null
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.feed.kind, FeedKind::Hardware);
        assert!(config.feed.command.is_none());
    }

    #[test]
    fn test_parse_config_bad_values() {
        assert!(parse_config("feed:\n  kind: carrier-pigeon\n").is_err());
        assert!(parse_config("ingest:\n  tick_seconds: fast\n").is_err());
        assert!(parse_config("dashboard:\n  port: 99999\n").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/skywatch.yaml")).unwrap();
        assert_eq!(config.ingest.tick_seconds, 5);
    }
}
