//! Staleness eviction and durable-data retention.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use skywatch_core::LiveTable;

use crate::store::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub evicted: usize,
    pub purged_positions: usize,
    pub purged_statistics: usize,
}

pub struct Sweeper {
    table: Arc<LiveTable>,
    store: Arc<Store>,
    cache_max_age: TimeDelta,
    retention_positions: TimeDelta,
    retention_statistics: TimeDelta,
}

impl Sweeper {
    pub fn new(
        table: Arc<LiveTable>,
        store: Arc<Store>,
        cache_max_age: TimeDelta,
        retention_positions: TimeDelta,
        retention_statistics: TimeDelta,
    ) -> Self {
        Sweeper {
            table,
            store,
            cache_max_age,
            retention_positions,
            retention_statistics,
        }
    }

    /// One maintenance pass. Eviction and purge are independent: a store
    /// failure is logged and does not prevent table eviction, and vice versa.
    pub fn run(&self, now: DateTime<Utc>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        outcome.evicted = self.table.evict_stale(self.cache_max_age, now);
        if outcome.evicted > 0 {
            info!(evicted = outcome.evicted, "removed stale aircraft from live table");
        }

        let positions_cutoff = now - self.retention_positions;
        let statistics_cutoff = now - self.retention_statistics;
        match self.store.purge_older_than(positions_cutoff, statistics_cutoff) {
            Ok((positions, statistics)) => {
                outcome.purged_positions = positions;
                outcome.purged_statistics = statistics;
                if positions > 0 || statistics > 0 {
                    info!(positions, statistics, "purged expired rows");
                }
            }
            Err(err) => warn!(error = %err, "retention purge failed"),
        }

        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
