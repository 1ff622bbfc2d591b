//! Background ingest loop.
//!
//! A dedicated thread polls every configured feed on a fixed tick, normalizes
//! what came back, updates the live table, and batches valid reports into the
//! store. Maintenance (staleness sweep, daily rollup) piggybacks on the same
//! thread using wall-clock deltas, so a long feed stall never skips cleanup.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use skywatch_core::config::IngestConfig;
use skywatch_core::report::{DropCounts, Normalizer};
use skywatch_core::{Feed, LiveTable};

use crate::retention::Sweeper;
use crate::stats::Aggregator;
use crate::store::Store;

struct Shared {
    table: Arc<LiveTable>,
    store: Arc<Store>,
    feeds: Mutex<Vec<Box<dyn Feed + Send>>>,
    normalizer: Mutex<Normalizer>,
    sweeper: Sweeper,
    aggregator: Aggregator,
    cfg: IngestConfig,
    last_error: Mutex<Option<String>>,
}

struct Running {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

pub struct IngestLoop {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl IngestLoop {
    pub fn new(
        table: Arc<LiveTable>,
        store: Arc<Store>,
        feeds: Vec<Box<dyn Feed + Send>>,
        cfg: IngestConfig,
        sweeper: Sweeper,
        aggregator: Aggregator,
    ) -> Self {
        IngestLoop {
            shared: Arc::new(Shared {
                table,
                store,
                feeds: Mutex::new(feeds),
                normalizer: Mutex::new(Normalizer::default()),
                sweeper,
                aggregator,
                cfg,
                last_error: Mutex::new(None),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }

    pub fn drop_counts(&self) -> DropCounts {
        self.shared.normalizer.lock().unwrap().counts
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().unwrap().clone()
    }

    /// Spawn the ingest thread. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("skywatch-ingest".into())
            .spawn(move || {
                run_loop(&shared, stop_rx);
                let _ = done_tx.send(());
            })
            .expect("spawn ingest thread");

        *running = Some(Running {
            stop_tx,
            done_rx,
            handle,
        });
        info!("ingest loop started");
        true
    }

    /// Signal the ingest thread to stop and wait a bounded time for it to
    /// finish. Returns false if it was not running. A thread stuck in a feed
    /// poll past the timeout is detached rather than blocked on.
    pub fn stop(&self) -> bool {
        let Some(running) = self.running.lock().unwrap().take() else {
            return false;
        };

        let _ = running.stop_tx.send(());
        let timeout = Duration::from_secs(self.shared.cfg.stop_timeout_seconds);
        match running.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = running.handle.join();
                info!("ingest loop stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_seconds = self.shared.cfg.stop_timeout_seconds,
                    "ingest thread did not stop in time, detaching"
                );
            }
        }
        true
    }

    /// Run a single poll-normalize-persist cycle on the calling thread.
    pub fn tick_once(&self) {
        tick(&self.shared, Utc::now());
    }
}

fn run_loop(shared: &Shared, stop_rx: Receiver<()>) {
    let tick_interval = Duration::from_secs(shared.cfg.tick_seconds.max(1));
    let sweep_every = TimeDelta::seconds(shared.cfg.sweep_interval_seconds as i64);
    let stats_every = TimeDelta::seconds(shared.cfg.stats_interval_seconds as i64);

    let mut last_sweep = Utc::now();
    let mut last_stats = Utc::now();

    loop {
        let now = Utc::now();

        // A panicking feed or store must not take the whole loop down.
        let result = catch_unwind(AssertUnwindSafe(|| tick(shared, now)));
        if result.is_err() {
            error!("ingest tick panicked");
            *shared.last_error.lock().unwrap() = Some("ingest tick panicked".into());
        }

        if now - last_sweep >= sweep_every {
            shared.sweeper.run(now);
            last_sweep = now;
        }
        if now - last_stats >= stats_every {
            if let Err(err) = shared.aggregator.run(now) {
                warn!(error = %err, "daily statistics run failed");
            }
            last_stats = now;
        }

        match stop_rx.recv_timeout(tick_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

fn tick(shared: &Shared, now: DateTime<Utc>) {
    let mut failed = false;

    let mut raws = Vec::new();
    {
        let mut feeds = shared.feeds.lock().unwrap();
        for feed in feeds.iter_mut() {
            match feed.poll() {
                Ok(batch) => raws.extend(batch),
                Err(err) => {
                    warn!(feed = feed.name(), error = %err, "feed poll failed");
                    failed = true;
                    *shared.last_error.lock().unwrap() =
                        Some(format!("{}: {}", feed.name(), err));
                }
            }
        }
    }

    if !raws.is_empty() {
        let mut accepted = Vec::with_capacity(raws.len());
        {
            let mut normalizer = shared.normalizer.lock().unwrap();
            for raw in &raws {
                if let Some(report) = normalizer.normalize(raw, now) {
                    accepted.push(report);
                }
            }
        }

        for report in &accepted {
            shared.table.upsert(report.clone());
        }

        match shared.store.write_batch(&accepted) {
            Ok(written) => debug!(
                received = raws.len(),
                accepted = accepted.len(),
                written,
                "ingest tick"
            ),
            Err(err) => {
                warn!(error = %err, "position batch write failed");
                failed = true;
                *shared.last_error.lock().unwrap() = Some(format!("store: {err}"));
            }
        }
    }

    // Transient failures are retried next tick; a clean tick clears them
    // so health stops reporting the feeds as degraded.
    if !failed {
        *shared.last_error.lock().unwrap() = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
