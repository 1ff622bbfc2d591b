//! Report normalization — raw feed records into canonical position reports.
//!
//! Pure logic, no I/O. The normalizer applies each validation rule
//! independently: an out-of-range sub-field is cleared to absent rather
//! than rejecting the whole report. Only two checks are load-bearing:
//! the ICAO address (report dropped if it cannot be normalized) and the
//! geodetic position (cleared as a pair, never half-valid).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo;
use crate::types::{icao_to_string, is_valid_squawk, normalize_icao, Icao};

/// Validated altitude range, feet.
pub const ALTITUDE_RANGE: (i32, i32) = (-1_000, 60_000);
/// Validated ground speed range, knots.
pub const SPEED_RANGE: (f64, f64) = (0.0, 1_000.0);

// ---------------------------------------------------------------------------
// Raw report (feed output)
// ---------------------------------------------------------------------------

/// Structured aircraft record as emitted by a feed, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReport {
    pub icao: String,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<i32>,
    #[serde(default)]
    pub ground_speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub vertical_rate: Option<i32>,
    #[serde(default)]
    pub squawk: Option<String>,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Position report (canonical, immutable once constructed)
// ---------------------------------------------------------------------------

/// A validated aircraft state report.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub icao: Icao,
    pub callsign: Option<String>,
    /// (latitude, longitude); both in range when present.
    pub position: Option<(f64, f64)>,
    pub altitude: Option<i32>,
    pub ground_speed: Option<f64>,
    pub heading: Option<f64>,
    pub vertical_rate: Option<i32>,
    pub squawk: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl PositionReport {
    pub fn icao_hex(&self) -> String {
        icao_to_string(&self.icao)
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.position.map(|(lat, _)| lat)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.position.map(|(_, lon)| lon)
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Counters for dropped reports and cleared fields, kept for observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropCounts {
    /// Reports dropped entirely (unparseable ICAO address).
    pub reports_rejected: u64,
    /// Positions cleared because a coordinate was missing or out of range.
    pub positions_cleared: u64,
    /// Other sub-fields cleared (callsign, altitude, speed, heading, squawk).
    pub fields_cleared: u64,
}

/// Validates raw feed records into `PositionReport`s.
///
/// Stateless apart from counters: call `normalize()` per record.
#[derive(Debug, Default)]
pub struct Normalizer {
    pub counts: DropCounts,
}

impl Normalizer {
    pub fn new() -> Self {
        Normalizer::default()
    }

    /// Produce a canonical report, or `None` if the identifier is malformed.
    ///
    /// `now` is used when the source omits an observation timestamp.
    pub fn normalize(&mut self, raw: &RawReport, now: DateTime<Utc>) -> Option<PositionReport> {
        let icao = match normalize_icao(&raw.icao) {
            Some(icao) => icao,
            None => {
                self.counts.reports_rejected += 1;
                debug!(icao = %raw.icao, "dropped report with malformed ICAO address");
                return None;
            }
        };

        let callsign = match raw.callsign.as_deref().map(clean_callsign) {
            Some(Some(cs)) => Some(cs),
            Some(None) => {
                self.counts.fields_cleared += 1;
                None
            }
            None => None,
        };

        // A position is valid only as a pair; a lone or out-of-range
        // coordinate clears the whole position.
        let position = match (raw.latitude, raw.longitude) {
            (Some(lat), Some(lon)) if geo::validate_coordinates(lat, lon) => Some((lat, lon)),
            (None, None) => None,
            _ => {
                self.counts.positions_cleared += 1;
                None
            }
        };

        let altitude = self.range_check(raw.altitude, |a| {
            (ALTITUDE_RANGE.0..=ALTITUDE_RANGE.1).contains(&a)
        });
        let ground_speed = self.range_check(raw.ground_speed, |s| {
            (SPEED_RANGE.0..=SPEED_RANGE.1).contains(&s)
        });
        let heading = self.range_check(raw.heading, |h| (0.0..360.0).contains(&h));

        let squawk = match raw.squawk.as_deref() {
            Some(s) if is_valid_squawk(s) => Some(s.trim().to_string()),
            Some(_) => {
                self.counts.fields_cleared += 1;
                None
            }
            None => None,
        };

        Some(PositionReport {
            icao,
            callsign,
            position,
            altitude,
            ground_speed,
            heading,
            vertical_rate: raw.vertical_rate,
            squawk,
            observed_at: raw.observed_at.unwrap_or(now),
        })
    }

    fn range_check<T: Copy>(&mut self, val: Option<T>, ok: impl Fn(T) -> bool) -> Option<T> {
        match val {
            Some(v) if ok(v) => Some(v),
            Some(_) => {
                self.counts.fields_cleared += 1;
                None
            }
            None => None,
        }
    }
}

/// Clean a raw callsign: trim, uppercase, strip everything outside
/// `[A-Z0-9-]`, then require a length of 2-8 characters.
pub fn clean_callsign(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    if (2..=8).contains(&cleaned.len()) {
        Some(cleaned)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(icao: &str) -> RawReport {
        RawReport {
            icao: icao.into(),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_icao_zero_padded() {
        let mut n = Normalizer::new();
        let report = n.normalize(&raw("ABC"), now()).unwrap();
        assert_eq!(report.icao_hex(), "000ABC");
    }

    #[test]
    fn test_malformed_icao_rejects_report() {
        let mut n = Normalizer::new();
        assert!(n.normalize(&raw("XYZ999"), now()).is_none());
        assert!(n.normalize(&raw("ABC1234"), now()).is_none());
        assert!(n.normalize(&raw(""), now()).is_none());
        assert_eq!(n.counts.reports_rejected, 3);
    }

    #[test]
    fn test_valid_position_kept() {
        let mut n = Normalizer::new();
        let mut r = raw("ABC123");
        r.latitude = Some(42.5);
        r.longitude = Some(-75.0);
        let report = n.normalize(&r, now()).unwrap();
        assert_eq!(report.position, Some((42.5, -75.0)));
    }

    #[test]
    fn test_out_of_range_coordinate_clears_pair() {
        let mut n = Normalizer::new();
        let mut r = raw("ABC123");
        r.latitude = Some(91.0); // invalid
        r.longitude = Some(-75.0); // valid
        let report = n.normalize(&r, now()).unwrap();
        assert!(report.position.is_none());
        assert_eq!(n.counts.positions_cleared, 1);
    }

    #[test]
    fn test_half_position_cleared() {
        let mut n = Normalizer::new();
        let mut r = raw("ABC123");
        r.latitude = Some(42.5);
        let report = n.normalize(&r, now()).unwrap();
        assert!(report.position.is_none());
        assert_eq!(n.counts.positions_cleared, 1);
    }

    #[test]
    fn test_callsign_cleaning() {
        assert_eq!(clean_callsign(" ual123 "), Some("UAL123".into()));
        assert_eq!(clean_callsign("N-123AB"), Some("N-123AB".into()));
        assert_eq!(clean_callsign("A/B*C1"), Some("ABC1".into()));
        assert_eq!(clean_callsign("X"), None); // too short after cleaning
        assert_eq!(clean_callsign("ABCDEFGHI"), None); // too long
        assert_eq!(clean_callsign("   "), None);
    }

    #[test]
    fn test_invalid_callsign_cleared_not_fatal() {
        let mut n = Normalizer::new();
        let mut r = raw("ABC123");
        r.callsign = Some("!".into());
        let report = n.normalize(&r, now()).unwrap();
        assert!(report.callsign.is_none());
        assert_eq!(n.counts.fields_cleared, 1);
    }

    #[test]
    fn test_numeric_ranges_cleared_never_clamped() {
        let mut n = Normalizer::new();
        let mut r = raw("ABC123");
        r.altitude = Some(70_000);
        r.ground_speed = Some(1_200.0);
        r.heading = Some(360.0); // heading range is half-open
        r.squawk = Some("7890".into()); // non-octal digits
        let report = n.normalize(&r, now()).unwrap();
        assert!(report.altitude.is_none());
        assert!(report.ground_speed.is_none());
        assert!(report.heading.is_none());
        assert!(report.squawk.is_none());
        assert_eq!(n.counts.fields_cleared, 4);
    }

    #[test]
    fn test_boundary_values_kept() {
        let mut n = Normalizer::new();
        let mut r = raw("ABC123");
        r.altitude = Some(-1_000);
        r.ground_speed = Some(1_000.0);
        r.heading = Some(0.0);
        r.vertical_rate = Some(-3_200);
        r.squawk = Some("0000".into());
        let report = n.normalize(&r, now()).unwrap();
        assert_eq!(report.altitude, Some(-1_000));
        assert_eq!(report.ground_speed, Some(1_000.0));
        assert_eq!(report.heading, Some(0.0));
        assert_eq!(report.vertical_rate, Some(-3_200));
        assert_eq!(report.squawk.as_deref(), Some("0000"));
    }

    #[test]
    fn test_observed_at_defaults_to_ingest_time() {
        let mut n = Normalizer::new();
        let report = n.normalize(&raw("ABC123"), now()).unwrap();
        assert_eq!(report.observed_at, now());

        let mut r = raw("ABC123");
        let source_ts = Utc.with_ymd_and_hms(2024, 2, 28, 6, 0, 0).unwrap();
        r.observed_at = Some(source_ts);
        let report = n.normalize(&r, now()).unwrap();
        assert_eq!(report.observed_at, source_ts);
    }
}
