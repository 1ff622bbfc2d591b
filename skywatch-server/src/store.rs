//! SQLite durable store — WAL mode, indexed position history, daily rollups.
//!
//! The store owns all historical rows and serializes its own writes behind
//! a connection mutex; concurrent callers interleave at the transaction
//! boundary and never observe partial rows. Every operation is bounded by
//! the connection's busy timeout. Policy (what to write, when to purge)
//! lives with the callers — this adapter only does storage.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use skywatch_core::report::PositionReport;
use skywatch_core::types::{icao_to_string, normalize_icao, Error, Icao, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    icao TEXT NOT NULL,
    callsign TEXT,
    lat REAL,
    lon REAL,
    altitude INTEGER,
    speed REAL,
    heading REAL,
    vertical_rate INTEGER,
    squawk TEXT,
    timestamp REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_statistics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date REAL NOT NULL,
    total_aircraft INTEGER NOT NULL DEFAULT 0,
    total_positions INTEGER NOT NULL DEFAULT 0,
    unique_callsigns INTEGER NOT NULL DEFAULT 0,
    avg_altitude REAL,
    max_altitude INTEGER
);

CREATE TABLE IF NOT EXISTS flight_tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    icao TEXT NOT NULL,
    callsign TEXT,
    first_seen REAL NOT NULL,
    last_seen REAL NOT NULL,
    total_positions INTEGER DEFAULT 0,
    min_altitude INTEGER,
    max_altitude INTEGER,
    avg_speed REAL,
    distance_nm REAL
);

CREATE INDEX IF NOT EXISTS idx_positions_icao ON positions(icao);
CREATE INDEX IF NOT EXISTS idx_positions_timestamp ON positions(timestamp);
CREATE INDEX IF NOT EXISTS idx_daily_statistics_date ON daily_statistics(date);
CREATE INDEX IF NOT EXISTS idx_flight_tracks_icao ON flight_tracks(icao);
"#;

/// One row of the daily rollup table.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyStatistics {
    /// Start of the UTC calendar day.
    pub date: DateTime<Utc>,
    pub total_aircraft: i64,
    pub total_positions: i64,
    pub unique_callsigns: i64,
    pub avg_altitude: Option<f64>,
    pub max_altitude: Option<i32>,
}

/// Filter for position history queries. All clauses optional.
#[derive(Debug, Clone, Default)]
pub struct PositionFilter {
    pub icao: Option<Icao>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

fn to_epoch(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

fn from_epoch(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).unwrap_or_default()
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

/// SQLite-backed durable store for position history and statistics.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open(path: &str, busy_timeout: Duration) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory().map_err(store_err)?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path).map_err(store_err)?
        };

        conn.busy_timeout(busy_timeout).map_err(store_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;

        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        Self::open(":memory:", Duration::from_secs(5))
    }

    // -----------------------------------------------------------------------
    // Positions
    // -----------------------------------------------------------------------

    /// Persist a batch of reports in one transaction.
    ///
    /// Best-effort within the batch: reports without a valid position are
    /// skipped rather than failing the whole batch. Returns the count
    /// actually written.
    pub fn write_batch(&self, reports: &[PositionReport]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(store_err)?;
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO positions
                     (icao, callsign, lat, lon, altitude, speed, heading, vertical_rate, squawk, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(store_err)?;

            for report in reports {
                let Some((lat, lon)) = report.position else {
                    continue;
                };
                stmt.execute(params![
                    report.icao_hex(),
                    report.callsign,
                    lat,
                    lon,
                    report.altitude,
                    report.ground_speed,
                    report.heading,
                    report.vertical_rate,
                    report.squawk,
                    to_epoch(report.observed_at),
                ])
                .map_err(store_err)?;
                written += 1;
            }
        }
        tx.commit().map_err(store_err)?;
        Ok(written)
    }

    /// Position history, newest first, capped at `limit`.
    pub fn query_positions(
        &self,
        filter: &PositionFilter,
        limit: i64,
    ) -> Result<Vec<PositionReport>> {
        let mut conditions = vec!["1=1".to_string()];
        let mut binds: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(icao) = &filter.icao {
            conditions.push(format!("icao = ?{}", binds.len() + 1));
            binds.push(Box::new(icao_to_string(icao)));
        }
        if let Some(start) = filter.start {
            conditions.push(format!("timestamp >= ?{}", binds.len() + 1));
            binds.push(Box::new(to_epoch(start)));
        }
        if let Some(end) = filter.end {
            conditions.push(format!("timestamp <= ?{}", binds.len() + 1));
            binds.push(Box::new(to_epoch(end)));
        }

        let sql = format!(
            "SELECT icao, callsign, lat, lon, altitude, speed, heading, vertical_rate, squawk, timestamp
             FROM positions WHERE {}
             ORDER BY timestamp DESC LIMIT ?{}",
            conditions.join(" AND "),
            binds.len() + 1
        );
        binds.push(Box::new(limit));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let refs: Vec<&dyn rusqlite::types::ToSql> = binds.iter().map(|b| b.as_ref()).collect();

        let rows = stmt
            .query_map(refs.as_slice(), row_to_report)
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Latest row per aircraft with `timestamp >= now - max_age`.
    pub fn query_current(
        &self,
        max_age: chrono::TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Vec<PositionReport>> {
        let cutoff = to_epoch(now - max_age);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT p.icao, p.callsign, p.lat, p.lon, p.altitude, p.speed, p.heading,
                        p.vertical_rate, p.squawk, p.timestamp
                 FROM positions p
                 JOIN (SELECT icao, MAX(timestamp) AS latest
                       FROM positions WHERE timestamp >= ?1 GROUP BY icao) m
                   ON p.icao = m.icao AND p.timestamp = m.latest
                 ORDER BY p.icao",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![cutoff], row_to_report)
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn count_positions(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM positions", [], |r| r.get(0))
            .map_err(store_err)
    }

    // -----------------------------------------------------------------------
    // Daily statistics
    // -----------------------------------------------------------------------

    /// Aggregate the positions inside `[start, end)`.
    ///
    /// Returns `None` when no rows exist for the window.
    pub fn aggregate_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<DailyStatistics>> {
        let conn = self.conn.lock().unwrap();
        let stats = conn
            .query_row(
                "SELECT COUNT(DISTINCT icao),
                        COUNT(*),
                        COUNT(DISTINCT CASE WHEN callsign IS NOT NULL AND callsign != ''
                                            THEN callsign END),
                        AVG(altitude),
                        MAX(altitude)
                 FROM positions WHERE timestamp >= ?1 AND timestamp < ?2",
                params![to_epoch(start), to_epoch(end)],
                |r| {
                    Ok(DailyStatistics {
                        date: start,
                        total_aircraft: r.get(0)?,
                        total_positions: r.get(1)?,
                        unique_callsigns: r.get(2)?,
                        avg_altitude: r.get(3)?,
                        max_altitude: r.get(4)?,
                    })
                },
            )
            .map_err(store_err)?;

        Ok((stats.total_positions > 0).then_some(stats))
    }

    /// Replace the statistics row for the given date's day window.
    pub fn upsert_daily_statistics(&self, stats: &DailyStatistics) -> Result<()> {
        let day_start = to_epoch(stats.date);
        let day_end = to_epoch(stats.date + chrono::TimeDelta::days(1));

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(store_err)?;
        tx.execute(
            "DELETE FROM daily_statistics WHERE date >= ?1 AND date < ?2",
            params![day_start, day_end],
        )
        .map_err(store_err)?;
        tx.execute(
            "INSERT INTO daily_statistics
             (date, total_aircraft, total_positions, unique_callsigns, avg_altitude, max_altitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                day_start,
                stats.total_aircraft,
                stats.total_positions,
                stats.unique_callsigns,
                stats.avg_altitude,
                stats.max_altitude,
            ],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)
    }

    /// Rollups for the last `days` days, newest first.
    pub fn get_statistics(&self, days: i64, now: DateTime<Utc>) -> Result<Vec<DailyStatistics>> {
        let cutoff = to_epoch(now - chrono::TimeDelta::days(days));
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT date, total_aircraft, total_positions, unique_callsigns,
                        avg_altitude, max_altitude
                 FROM daily_statistics WHERE date >= ?1 ORDER BY date DESC",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![cutoff], |r| {
                Ok(DailyStatistics {
                    date: from_epoch(r.get(0)?),
                    total_aircraft: r.get(1)?,
                    total_positions: r.get(2)?,
                    unique_callsigns: r.get(3)?,
                    avg_altitude: r.get(4)?,
                    max_altitude: r.get(5)?,
                })
            })
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Delete rows strictly older than each cutoff.
    /// Returns `(positions_deleted, statistics_deleted)`.
    pub fn purge_older_than(
        &self,
        positions_cutoff: DateTime<Utc>,
        statistics_cutoff: DateTime<Utc>,
    ) -> Result<(usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let positions = conn
            .execute(
                "DELETE FROM positions WHERE timestamp < ?1",
                params![to_epoch(positions_cutoff)],
            )
            .map_err(store_err)?;
        let statistics = conn
            .execute(
                "DELETE FROM daily_statistics WHERE date < ?1",
                params![to_epoch(statistics_cutoff)],
            )
            .map_err(store_err)?;
        Ok((positions, statistics))
    }

    /// Cheap connectivity probe.
    pub fn health_check(&self) -> bool {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).is_ok()
    }
}

fn row_to_report(r: &rusqlite::Row<'_>) -> rusqlite::Result<PositionReport> {
    let icao_hex: String = r.get(0)?;
    let lat: Option<f64> = r.get(2)?;
    let lon: Option<f64> = r.get(3)?;
    Ok(PositionReport {
        icao: normalize_icao(&icao_hex).unwrap_or_default(),
        callsign: r.get(1)?,
        position: lat.zip(lon),
        altitude: r.get(4)?,
        ground_speed: r.get(5)?,
        heading: r.get(6)?,
        vertical_rate: r.get(7)?,
        squawk: r.get(8)?,
        observed_at: from_epoch(r.get(9)?),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
