//! Feed implementations backed by real I/O: HTTP polling of dump1090-style
//! receivers, and an external demodulator process streaming JSON lines.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use skywatch_core::report::RawReport;
use skywatch_core::types::{Error, Result};
use skywatch_core::Feed;

// ---------------------------------------------------------------------------
// Network feed
// ---------------------------------------------------------------------------

/// dump1090 `aircraft.json` document.
#[derive(Debug, Deserialize)]
struct Dump1090File {
    #[serde(default)]
    aircraft: Vec<Dump1090Aircraft>,
}

#[derive(Debug, Deserialize)]
struct Dump1090Aircraft {
    hex: String,
    flight: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    // dump1090 reports "ground" here for aircraft on the surface.
    alt_baro: Option<serde_json::Value>,
    gs: Option<f64>,
    track: Option<f64>,
    baro_rate: Option<i32>,
    squawk: Option<String>,
}

/// Polls one dump1090-compatible HTTP endpoint for its aircraft list.
pub struct NetworkFeed {
    name: String,
    url: String,
    client: reqwest::blocking::Client,
}

impl NetworkFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Feed(format!("http client: {e}")))?;
        Ok(NetworkFeed {
            name: format!("network:{url}"),
            url,
            client,
        })
    }
}

impl Feed for NetworkFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<Vec<RawReport>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| Error::Feed(format!("{}: {e}", self.url)))?;
        parse_dump1090(&body)
    }
}

/// Parse a dump1090 `aircraft.json` document into raw reports.
pub fn parse_dump1090(body: &str) -> Result<Vec<RawReport>> {
    let file: Dump1090File =
        serde_json::from_str(body).map_err(|e| Error::Feed(format!("bad aircraft.json: {e}")))?;

    let reports = file
        .aircraft
        .into_iter()
        .map(|ac| RawReport {
            icao: ac.hex,
            callsign: ac.flight,
            latitude: ac.lat,
            longitude: ac.lon,
            altitude: ac.alt_baro.and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_i64().map(|a| a as i32),
                // "ground" and anything else non-numeric
                _ => None,
            }),
            ground_speed: ac.gs,
            heading: ac.track,
            vertical_rate: ac.baro_rate,
            squawk: ac.squawk,
            observed_at: None,
        })
        .collect();
    Ok(reports)
}

// ---------------------------------------------------------------------------
// Hardware feed
// ---------------------------------------------------------------------------

/// Runs an external demodulator command and reads one JSON report per stdout
/// line. A reader thread drains the pipe so the child never blocks; `poll`
/// collects whatever arrived since the last tick.
pub struct HardwareFeed {
    name: String,
    child: Child,
    rx: Receiver<RawReport>,
}

impl HardwareFeed {
    pub fn spawn(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Feed("empty feed command".into()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Feed(format!("spawn {program}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Feed("child stdout unavailable".into()))?;

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("skywatch-hardware-read".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RawReport>(line) {
                        Ok(report) => {
                            if tx.send(report).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "unparseable demodulator line"),
                    }
                }
            })
            .map_err(|e| Error::Feed(format!("reader thread: {e}")))?;

        Ok(HardwareFeed {
            name: format!("hardware:{program}"),
            child,
            rx,
        })
    }
}

impl Feed for HardwareFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<Vec<RawReport>> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Err(Error::Feed(format!("demodulator exited: {status}")));
        }

        let mut reports = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(report) => reports.push(report),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if reports.is_empty() {
                        return Err(Error::Feed("demodulator stream closed".into()));
                    }
                    break;
                }
            }
        }
        Ok(reports)
    }
}

impl Drop for HardwareFeed {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(feed = %self.name, error = %e, "failed to kill demodulator");
        }
        let _ = self.child.wait();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
