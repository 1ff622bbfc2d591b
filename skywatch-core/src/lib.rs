//! skywatch-core: Pure ingest-and-track logic for ADS-B position reports.
//!
//! No async, no database, no network — just report validation, the live
//! aircraft table, and the feed capability. This crate is the shared core
//! used by `skywatch-server` (ingest loop, persistence, CLI, dashboard).

pub mod config;
pub mod feed;
pub mod geo;
pub mod report;
pub mod table;
pub mod types;

// Re-export commonly used types at crate root
pub use feed::{Feed, SyntheticFeed};
pub use report::{DropCounts, Normalizer, PositionReport, RawReport};
pub use table::{LiveTable, TrackedAircraft};
pub use types::*;
