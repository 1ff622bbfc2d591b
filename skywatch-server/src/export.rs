//! Position export in JSON, CSV, and GeoJSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use skywatch_core::geo::GeoBounds;
use skywatch_core::report::PositionReport;
use skywatch_core::types::{Error, Result};

use crate::store::{PositionFilter, Store};

/// Hard cap on rows per export.
const EXPORT_LIMIT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    GeoJson,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::GeoJson => "geojson",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "geojson" => Ok(ExportFormat::GeoJson),
            other => Err(Error::Config(format!("unknown export format: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub bounds: Option<GeoBounds>,
    pub output: Option<PathBuf>,
}

/// Query matching positions and write them to a file, returning its path.
pub fn export(store: &Arc<Store>, req: &ExportRequest) -> Result<PathBuf> {
    let filter = PositionFilter {
        icao: None,
        start: req.start,
        end: req.end,
    };
    let mut positions = store.query_positions(&filter, EXPORT_LIMIT)?;

    if let Some(bounds) = &req.bounds {
        positions.retain(|p| match p.position {
            Some((lat, lon)) => bounds.contains(lat, lon),
            None => false,
        });
    }
    if positions.is_empty() {
        return Err(Error::NoData);
    }

    let path = match &req.output {
        Some(path) => path.clone(),
        None => PathBuf::from(format!(
            "skywatch_export_{}.{}",
            Utc::now().timestamp(),
            req.format.extension()
        )),
    };

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    match req.format {
        ExportFormat::Json => write_json(&mut writer, &positions)?,
        ExportFormat::Csv => write_csv(&mut writer, &positions)?,
        ExportFormat::GeoJson => write_geojson(&mut writer, &positions)?,
    }
    writer.flush()?;

    info!(path = %path.display(), count = positions.len(), "export written");
    Ok(path)
}

fn write_json(w: &mut impl Write, positions: &[PositionReport]) -> Result<()> {
    let rows: Vec<_> = positions.iter().map(position_json).collect();
    let doc = json!({
        "export_time": Utc::now().to_rfc3339(),
        "total_positions": positions.len(),
        "positions": rows,
    });
    serde_json::to_writer_pretty(w, &doc).map_err(|e| Error::Store(e.to_string()))
}

fn write_csv(w: &mut impl Write, positions: &[PositionReport]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(w);
    csv.write_record([
        "icao", "callsign", "latitude", "longitude", "altitude", "speed", "heading",
        "vertical_rate", "squawk", "timestamp",
    ])
    .map_err(|e| Error::Store(e.to_string()))?;

    for p in positions {
        let record = [
            p.icao_hex(),
            p.callsign.clone().unwrap_or_default(),
            p.latitude().map(|v| v.to_string()).unwrap_or_default(),
            p.longitude().map(|v| v.to_string()).unwrap_or_default(),
            p.altitude.map(|v| v.to_string()).unwrap_or_default(),
            p.ground_speed.map(|v| v.to_string()).unwrap_or_default(),
            p.heading.map(|v| v.to_string()).unwrap_or_default(),
            p.vertical_rate.map(|v| v.to_string()).unwrap_or_default(),
            p.squawk.clone().unwrap_or_default(),
            p.observed_at.to_rfc3339(),
        ];
        csv.write_record(&record)
            .map_err(|e| Error::Store(e.to_string()))?;
    }
    csv.flush()?;
    Ok(())
}

fn write_geojson(w: &mut impl Write, positions: &[PositionReport]) -> Result<()> {
    let features: Vec<_> = positions
        .iter()
        .filter_map(|p| {
            let (lat, lon) = p.position?;
            Some(json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [lon, lat],
                },
                "properties": {
                    "icao": p.icao_hex(),
                    "callsign": p.callsign,
                    "altitude": p.altitude,
                    "speed": p.ground_speed,
                    "heading": p.heading,
                    "squawk": p.squawk,
                    "timestamp": p.observed_at.to_rfc3339(),
                },
            }))
        })
        .collect();

    let doc = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    serde_json::to_writer_pretty(w, &doc).map_err(|e| Error::Store(e.to_string()))
}

fn position_json(p: &PositionReport) -> serde_json::Value {
    json!({
        "icao": p.icao_hex(),
        "callsign": p.callsign,
        "latitude": p.latitude(),
        "longitude": p.longitude(),
        "altitude": p.altitude,
        "speed": p.ground_speed,
        "heading": p.heading,
        "vertical_rate": p.vertical_rate,
        "squawk": p.squawk,
        "timestamp": p.observed_at.to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use skywatch_core::types::normalize_icao;

    fn report(icao: &str, lat: f64, lon: f64) -> PositionReport {
        PositionReport {
            icao: normalize_icao(icao).unwrap(),
            callsign: Some("UAL123".into()),
            position: Some((lat, lon)),
            altitude: Some(35_000),
            ground_speed: Some(450.0),
            heading: Some(270.0),
            vertical_rate: None,
            squawk: Some("1200".into()),
            observed_at: Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        }
    }

    fn seeded_store(reports: &[PositionReport]) -> Arc<Store> {
        let store = Arc::new(Store::open_memory().unwrap());
        store.write_batch(reports).unwrap();
        store
    }

    #[test]
    fn test_geojson_with_bounds() {
        let store = seeded_store(&[
            report("ABC123", 42.0, -75.0),
            report("DEF456", 50.0, -75.0),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");

        let req = ExportRequest {
            format: ExportFormat::GeoJson,
            start: None,
            end: None,
            bounds: Some("40,-80,45,-70".parse().unwrap()),
            output: Some(path.clone()),
        };
        let written = export(&store, &req).unwrap();
        assert_eq!(written, path);

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 1, "out-of-bounds aircraft excluded");
        assert_eq!(features[0]["properties"]["icao"], "ABC123");
        assert_eq!(
            features[0]["geometry"]["coordinates"],
            serde_json::json!([-75.0, 42.0]),
            "GeoJSON order is [lon, lat]"
        );
    }

    #[test]
    fn test_json_envelope() {
        let store = seeded_store(&[report("ABC123", 42.0, -75.0)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let req = ExportRequest {
            format: ExportFormat::Json,
            start: None,
            end: None,
            bounds: None,
            output: Some(path.clone()),
        };
        export(&store, &req).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["total_positions"], 1);
        assert_eq!(doc["positions"][0]["icao"], "ABC123");
        assert_eq!(doc["positions"][0]["squawk"], "1200");
    }

    #[test]
    fn test_csv_rows() {
        let store = seeded_store(&[report("ABC123", 42.0, -75.0)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let req = ExportRequest {
            format: ExportFormat::Csv,
            start: None,
            end: None,
            bounds: None,
            output: Some(path.clone()),
        };
        export(&store, &req).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let mut lines = body.lines();
        assert!(lines.next().unwrap().starts_with("icao,callsign"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("ABC123,UAL123,42,"));
    }

    #[test]
    fn test_empty_result_is_no_data() {
        let store = Arc::new(Store::open_memory().unwrap());
        let req = ExportRequest {
            format: ExportFormat::Json,
            start: None,
            end: None,
            bounds: None,
            output: None,
        };
        assert!(matches!(export(&store, &req), Err(Error::NoData)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("GeoJSON".parse::<ExportFormat>().unwrap(), ExportFormat::GeoJson);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
