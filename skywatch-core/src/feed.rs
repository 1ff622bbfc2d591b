//! Feed capability — pull-style report sources.
//!
//! The ingest loop depends only on the `Feed` trait, never on a concrete
//! variant. `SyntheticFeed` lives here (pure logic, no I/O); the network
//! and hardware variants live in the server crate with the rest of the
//! I/O code.

use chrono::Utc;
use rand::Rng;

use crate::report::RawReport;
use crate::types::Result;

/// A pull-style source of raw aircraft records.
///
/// `poll()` must return promptly — never block longer than the ingest
/// tick interval.
pub trait Feed: Send {
    /// Human-readable source name (for logs and health output).
    fn name(&self) -> &str;

    /// Current batch of raw records. An empty batch is normal.
    fn poll(&mut self) -> Result<Vec<RawReport>>;
}

// ---------------------------------------------------------------------------
// Synthetic feed
// ---------------------------------------------------------------------------

const AIRLINES: &[&str] = &["UAL", "DAL", "AAL", "SWA", "JBU", "VRD", "ASA", "FFT"];

/// Simulated traffic for demos and testing: a fixed set of aircraft doing
/// a random walk around a center point.
pub struct SyntheticFeed {
    name: String,
    aircraft: Vec<RawReport>,
}

impl SyntheticFeed {
    pub fn new(center_lat: f64, center_lon: f64, radius_nm: f64, num_aircraft: usize) -> Self {
        let mut rng = rand::thread_rng();
        let mut aircraft = Vec::with_capacity(num_aircraft);

        for _ in 0..num_aircraft {
            let angle = rng.gen_range(0.0..std::f64::consts::TAU);
            let distance = rng.gen_range(0.0..radius_nm);
            let airline = AIRLINES[rng.gen_range(0..AIRLINES.len())];

            aircraft.push(RawReport {
                icao: format!("{:06X}", rng.gen_range(0u32..0x100_0000)),
                callsign: Some(format!("{airline}{}", rng.gen_range(100..10_000))),
                latitude: Some(center_lat + distance * 0.01 * angle.cos()),
                longitude: Some(center_lon + distance * 0.01 * angle.sin()),
                altitude: Some(rng.gen_range(1_000..42_000)),
                ground_speed: Some(rng.gen_range(150.0..600.0)),
                heading: Some(rng.gen_range(0.0..360.0)),
                vertical_rate: Some(rng.gen_range(-2_000..2_000)),
                squawk: Some(format!("{:04o}", rng.gen_range(0u16..=0o7777))),
                observed_at: None,
            });
        }

        SyntheticFeed {
            name: "synthetic".into(),
            aircraft,
        }
    }

    /// Random-walk every aircraft one step.
    fn advance(&mut self) {
        let mut rng = rand::thread_rng();
        let now = Utc::now();

        for ac in &mut self.aircraft {
            if let (Some(lat), Some(lon)) = (ac.latitude, ac.longitude) {
                ac.latitude = Some(lat + rng.gen_range(-0.01..0.01));
                ac.longitude = Some(lon + rng.gen_range(-0.01..0.01));
            }
            if let Some(alt) = ac.altitude {
                ac.altitude = Some((alt + rng.gen_range(-500..=500)).clamp(1_000, 42_000));
            }
            if let Some(speed) = ac.ground_speed {
                ac.ground_speed = Some((speed + rng.gen_range(-20.0..20.0)).clamp(100.0, 600.0));
            }
            if let Some(heading) = ac.heading {
                ac.heading = Some((heading + rng.gen_range(-10.0..10.0)).rem_euclid(360.0));
            }
            ac.observed_at = Some(now);
        }
    }
}

impl Feed for SyntheticFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<Vec<RawReport>> {
        self.advance();
        Ok(self.aircraft.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
