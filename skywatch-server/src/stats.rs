//! Daily statistics aggregation.
//!
//! Recomputes the rollup for one UTC calendar day from scratch and replaces
//! the stored row wholesale — never incrementally updated, so a re-run for
//! the same day is idempotent.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use skywatch_core::types::Result;

use crate::store::Store;

pub struct Aggregator {
    store: Arc<Store>,
}

impl Aggregator {
    pub fn new(store: Arc<Store>) -> Self {
        Aggregator { store }
    }

    /// Recompute and replace the rollup for `for_date`'s UTC day.
    ///
    /// Returns `Ok(false)` when the day has no rows (nothing written).
    pub fn run(&self, for_date: DateTime<Utc>) -> Result<bool> {
        let day_start = for_date
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(for_date);
        let day_end = day_start + TimeDelta::days(1);

        let Some(stats) = self.store.aggregate_window(day_start, day_end)? else {
            debug!(date = %day_start.date_naive(), "no positions for day, skipping rollup");
            return Ok(false);
        };

        self.store.upsert_daily_statistics(&stats)?;
        info!(
            date = %day_start.date_naive(),
            aircraft = stats.total_aircraft,
            positions = stats.total_positions,
            "daily statistics updated"
        );
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use skywatch_core::report::PositionReport;
    use skywatch_core::types::normalize_icao;

    fn report(icao: &str, callsign: Option<&str>, alt: Option<i32>, at: DateTime<Utc>) -> PositionReport {
        PositionReport {
            icao: normalize_icao(icao).unwrap(),
            callsign: callsign.map(String::from),
            position: Some((42.5, -75.0)),
            altitude: alt,
            ground_speed: None,
            heading: None,
            vertical_rate: None,
            squawk: None,
            observed_at: at,
        }
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rollup_values() {
        let store = Arc::new(Store::open_memory().unwrap());
        store
            .write_batch(&[
                report("ABC123", Some("UAL1"), Some(30_000), noon(1)),
                report("ABC123", Some("UAL1"), Some(40_000), noon(1)),
                report("DEF456", None, None, noon(1)),
                // Next day must not leak into the rollup
                report("AAA111", Some("DAL2"), Some(10_000), noon(2)),
            ])
            .unwrap();

        let aggregator = Aggregator::new(Arc::clone(&store));
        assert!(aggregator.run(noon(1)).unwrap());

        let rows = store.get_statistics(7, noon(2)).unwrap();
        assert_eq!(rows.len(), 1);
        let s = &rows[0];
        assert_eq!(s.date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(s.total_aircraft, 2);
        assert_eq!(s.total_positions, 3);
        assert_eq!(s.unique_callsigns, 1);
        assert_eq!(s.avg_altitude, Some(35_000.0));
        assert_eq!(s.max_altitude, Some(40_000));
    }

    #[test]
    fn test_run_twice_is_idempotent() {
        let store = Arc::new(Store::open_memory().unwrap());
        store
            .write_batch(&[report("ABC123", Some("UAL1"), Some(30_000), noon(1))])
            .unwrap();

        let aggregator = Aggregator::new(Arc::clone(&store));
        assert!(aggregator.run(noon(1)).unwrap());
        assert!(aggregator.run(noon(1)).unwrap());

        let rows = store.get_statistics(7, noon(1)).unwrap();
        assert_eq!(rows.len(), 1, "exactly one row per day");
        assert_eq!(rows[0].total_positions, 1);
    }

    #[test]
    fn test_empty_day_is_noop() {
        let store = Arc::new(Store::open_memory().unwrap());
        let aggregator = Aggregator::new(Arc::clone(&store));

        assert!(!aggregator.run(noon(1)).unwrap());
        assert!(store.get_statistics(7, noon(1)).unwrap().is_empty());
    }
}
