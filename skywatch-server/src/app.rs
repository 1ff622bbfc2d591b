//! Application facade: wires feeds, live table, store, and the ingest loop
//! together and exposes the operations the CLI and the web API call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::warn;

use skywatch_core::config::{Config, FeedKind};
use skywatch_core::report::PositionReport;
use skywatch_core::types::{normalize_icao, Error, Result};
use skywatch_core::{Feed, LiveTable, SyntheticFeed, TrackedAircraft};

use crate::export::{self, ExportRequest};
use crate::feeds::{HardwareFeed, NetworkFeed};
use crate::ingest::IngestLoop;
use crate::retention::Sweeper;
use crate::stats::Aggregator;
use crate::store::{DailyStatistics, PositionFilter, Store};

// ---------------------------------------------------------------------------
// Health reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub overall: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pub config: Config,
    table: Arc<LiveTable>,
    store: Arc<Store>,
    ingest: IngestLoop,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let table = Arc::new(LiveTable::new());
        let store = Arc::new(Store::open(
            &config.database.path,
            Duration::from_millis(config.database.busy_timeout_ms),
        )?);

        let feeds = build_feeds(&config)?;
        let sweeper = Sweeper::new(
            Arc::clone(&table),
            Arc::clone(&store),
            TimeDelta::seconds(config.ingest.cache_max_age_seconds as i64),
            TimeDelta::days(config.database.retention_positions_days),
            TimeDelta::days(config.database.retention_statistics_days),
        );
        let aggregator = Aggregator::new(Arc::clone(&store));
        let ingest = IngestLoop::new(
            Arc::clone(&table),
            Arc::clone(&store),
            feeds,
            config.ingest.clone(),
            sweeper,
            aggregator,
        );

        Ok(App {
            config,
            table,
            store,
            ingest,
        })
    }

    pub fn start(&self) -> bool {
        self.ingest.start()
    }

    pub fn stop(&self) -> bool {
        self.ingest.stop()
    }

    #[cfg(test)]
    pub(crate) fn tick_once(&self) {
        self.ingest.tick_once()
    }

    /// Aircraft active within `max_age`, sorted by ICAO address. Served from
    /// the live table; falls back to the store when the table is empty (fresh
    /// restart before the first tick).
    pub fn get_current(&self, max_age: TimeDelta) -> Result<Vec<TrackedAircraft>> {
        let now = Utc::now();
        let mut aircraft: Vec<_> = self
            .table
            .snapshot()
            .into_iter()
            .filter(|a| a.age(now) <= max_age)
            .collect();

        if aircraft.is_empty() {
            aircraft = self
                .store
                .query_current(max_age, now)?
                .into_iter()
                .map(tracked_from_stored)
                .collect();
        }

        aircraft.sort_by_key(|a| a.report.icao);
        Ok(aircraft)
    }

    pub fn get_aircraft(&self, icao_hex: &str) -> Result<Option<TrackedAircraft>> {
        let icao = normalize_icao(icao_hex)
            .ok_or_else(|| Error::InvalidIcao(icao_hex.to_string()))?;
        Ok(self.table.get(&icao))
    }

    /// Stored position history for one aircraft, newest first.
    pub fn get_history(
        &self,
        icao_hex: &str,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<PositionReport>> {
        let icao = normalize_icao(icao_hex)
            .ok_or_else(|| Error::InvalidIcao(icao_hex.to_string()))?;
        let filter = PositionFilter {
            icao: Some(icao),
            start: since,
            end: None,
        };
        self.store.query_positions(&filter, limit)
    }

    pub fn get_statistics(&self, days: i64) -> Result<Vec<DailyStatistics>> {
        self.store.get_statistics(days, Utc::now())
    }

    pub fn export(&self, req: &ExportRequest) -> Result<PathBuf> {
        export::export(&self.store, req)
    }

    /// Per-component health probe. Overall is degraded when the store probe
    /// fails, the ingest loop is stopped, or a feed recorded an error.
    pub fn health(&self) -> Health {
        let mut components = Vec::with_capacity(3);

        let store_ok = self.store.health_check();
        components.push(ComponentHealth {
            name: "store",
            status: if store_ok {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            message: (!store_ok).then(|| "database probe failed".into()),
        });

        let running = self.ingest.is_running();
        components.push(ComponentHealth {
            name: "ingest",
            status: if running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            message: (!running).then(|| "ingest loop not running".into()),
        });

        let feed_error = self.ingest.last_error();
        components.push(ComponentHealth {
            name: "feeds",
            status: if feed_error.is_none() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            message: feed_error,
        });

        let overall = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Health {
            overall,
            components,
            timestamp: Utc::now(),
        }
    }
}

fn build_feeds(config: &Config) -> Result<Vec<Box<dyn Feed + Send>>> {
    let feed = &config.feed;
    let mut feeds: Vec<Box<dyn Feed + Send>> = Vec::new();

    match feed.kind {
        FeedKind::Synthetic => {
            feeds.push(Box::new(SyntheticFeed::new(
                feed.center_lat,
                feed.center_lon,
                feed.radius_nm,
                feed.aircraft,
            )));
        }
        FeedKind::Network => {
            let timeout = Duration::from_secs(feed.poll_timeout_seconds);
            for url in &feed.urls {
                feeds.push(Box::new(NetworkFeed::new(url.clone(), timeout)?));
            }
            if feeds.is_empty() {
                warn!("network feed selected but no urls configured");
            }
        }
        FeedKind::Hardware => {
            if let Some(command) = &feed.command {
                feeds.push(Box::new(HardwareFeed::spawn(command)?));
            } else {
                warn!("hardware feed selected but no command configured");
            }
        }
    }
    Ok(feeds)
}

fn tracked_from_stored(report: PositionReport) -> TrackedAircraft {
    let seen = report.observed_at;
    TrackedAircraft {
        report,
        first_seen: seen,
        last_seen: seen,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
