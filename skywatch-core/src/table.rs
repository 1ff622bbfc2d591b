//! Live aircraft table — latest known state per ICAO address.
//!
//! One logical writer (the ingest loop) and many concurrent readers share
//! the table through `Arc<LiveTable>`; a single `RwLock` around the map
//! makes every upsert atomic with respect to readers. Readers always get
//! copies, never references into the live structure.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::report::PositionReport;
use crate::types::{icao_to_string, Icao};

/// Latest known state of one tracked aircraft.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAircraft {
    pub report: PositionReport,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl TrackedAircraft {
    pub fn icao_hex(&self) -> String {
        icao_to_string(&self.report.icao)
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.last_seen
    }
}

/// In-memory map from ICAO address to latest state, with age-based eviction.
#[derive(Debug, Default)]
pub struct LiveTable {
    inner: RwLock<HashMap<Icao, TrackedAircraft>>,
}

impl LiveTable {
    pub fn new() -> Self {
        LiveTable::default()
    }

    /// Insert or overwrite the entry for the report's aircraft.
    ///
    /// `first_seen` is set only on first insert; every later report for the
    /// same address replaces the rest of the entry wholesale.
    pub fn upsert(&self, report: PositionReport) {
        let mut map = self.inner.write().unwrap();
        let observed = report.observed_at;
        match map.get_mut(&report.icao) {
            Some(entry) => {
                entry.report = report;
                entry.last_seen = observed;
            }
            None => {
                map.insert(
                    report.icao,
                    TrackedAircraft {
                        report,
                        first_seen: observed,
                        last_seen: observed,
                    },
                );
            }
        }
    }

    /// Point lookup. Returns a copy.
    pub fn get(&self, icao: &Icao) -> Option<TrackedAircraft> {
        self.inner.read().unwrap().get(icao).cloned()
    }

    /// Independent copy of all current entries. Iteration order is not
    /// meaningful; sort by ICAO for deterministic output.
    pub fn snapshot(&self) -> Vec<TrackedAircraft> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Remove every entry older than `max_age`. Returns count removed.
    pub fn evict_stale(&self, max_age: TimeDelta, now: DateTime<Utc>) -> usize {
        let mut map = self.inner.write().unwrap();
        let before = map.len();
        map.retain(|icao, entry| {
            let keep = entry.age(now) <= max_age;
            if !keep {
                debug!(icao = %icao_to_string(icao), "evicted stale aircraft");
            }
            keep
        });
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize_icao;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn report(icao: &str, at: DateTime<Utc>) -> PositionReport {
        PositionReport {
            icao: normalize_icao(icao).unwrap(),
            callsign: None,
            position: None,
            altitude: None,
            ground_speed: None,
            heading: None,
            vertical_rate: None,
            squawk: None,
            observed_at: at,
        }
    }

    #[test]
    fn test_upsert_then_get() {
        let table = LiveTable::new();
        let r = report("ABC123", ts(0));
        table.upsert(r.clone());

        let entry = table.get(&r.icao).unwrap();
        assert_eq!(entry.report, r);
        assert_eq!(entry.first_seen, ts(0));
        assert_eq!(entry.last_seen, ts(0));
    }

    #[test]
    fn test_last_write_wins_single_entry() {
        let table = LiveTable::new();

        let mut first = report("ABC123", ts(0));
        first.position = Some((42.5, -75.0));
        first.altitude = Some(35_000);
        table.upsert(first);

        let mut second = report("ABC123", ts(5));
        second.position = Some((42.6, -75.1));
        second.altitude = Some(35_500);
        table.upsert(second.clone());

        assert_eq!(table.len(), 1);
        let entry = table.get(&second.icao).unwrap();
        assert_eq!(entry.report.position, Some((42.6, -75.1)));
        assert_eq!(entry.report.altitude, Some(35_500));
        assert_eq!(entry.first_seen, ts(0), "first_seen survives overwrite");
        assert_eq!(entry.last_seen, ts(5));
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let table = LiveTable::new();
        table.upsert(report("ABC123", ts(0)));

        let snap = table.snapshot();
        table.upsert(report("DEF456", ts(1)));

        assert_eq!(snap.len(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_evict_stale() {
        let table = LiveTable::new();
        table.upsert(report("ABC123", ts(0)));
        table.upsert(report("DEF456", ts(100)));

        let removed = table.evict_stale(TimeDelta::seconds(60), ts(120));
        assert_eq!(removed, 1);
        assert!(table.get(&normalize_icao("ABC123").unwrap()).is_none());
        assert!(table.get(&normalize_icao("DEF456").unwrap()).is_some());
    }

    #[test]
    fn test_evict_zero_age_empties_table() {
        let table = LiveTable::new();
        table.upsert(report("ABC123", ts(0)));
        table.upsert(report("DEF456", ts(1)));

        assert_eq!(table.evict_stale(TimeDelta::zero(), ts(2)), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_evict_infinite_age_is_noop() {
        let table = LiveTable::new();
        table.upsert(report("ABC123", ts(0)));

        assert_eq!(table.evict_stale(TimeDelta::MAX, ts(1_000_000)), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_entries() {
        // One writer per aircraft hammers upserts where altitude and
        // vertical_rate always carry the same marker value; readers assert
        // the pair is consistent in every snapshot and point lookup.
        let table = Arc::new(LiveTable::new());
        let icaos = ["A00001", "A00002", "A00003", "A00004"];

        let mut handles = Vec::new();
        for icao in icaos {
            let table = Arc::clone(&table);
            handles.push(std::thread::spawn(move || {
                for k in 0..500i32 {
                    let mut r = report(icao, ts(k as i64));
                    r.altitude = Some(k);
                    r.vertical_rate = Some(k);
                    table.upsert(r);
                }
            }));
        }
        for _ in 0..4 {
            let table = Arc::clone(&table);
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    for entry in table.snapshot() {
                        assert_eq!(
                            entry.report.altitude, entry.report.vertical_rate,
                            "reader observed a half-written entry"
                        );
                    }
                    if let Some(entry) = table.get(&normalize_icao("A00001").unwrap()) {
                        assert_eq!(entry.report.altitude, entry.report.vertical_rate);
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), icaos.len());
    }
}
