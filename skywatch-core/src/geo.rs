//! Geographic helpers — coordinate validation, bounding boxes, great-circle
//! distance and bearing.

use std::str::FromStr;

use crate::types::{Error, Result};

/// Earth's radius in nautical miles.
const EARTH_RADIUS_NM: f64 = 3_440.065;

/// Check geodetic coordinate ranges.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Great-circle distance between two points, nautical miles (haversine).
pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_NM * c
}

/// Initial bearing from point 1 to point 2, degrees in [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlon_rad = (lon2 - lon1).to_radians();

    let y = dlon_rad.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon_rad.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

/// Rectangular geographic bounds. Parsed from "south,west,north,east".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Inclusive containment test.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        validate_coordinates(latitude, longitude)
            && (self.south..=self.north).contains(&latitude)
            && (self.west..=self.east).contains(&longitude)
    }
}

impl FromStr for GeoBounds {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::InvalidBounds(s.to_string()))?;

        let [south, west, north, east] = parts[..] else {
            return Err(Error::InvalidBounds(s.to_string()));
        };

        let bounds = GeoBounds {
            south,
            west,
            north,
            east,
        };
        if !validate_coordinates(south, west)
            || !validate_coordinates(north, east)
            || south > north
            || west > east
        {
            return Err(Error::InvalidBounds(s.to_string()));
        }
        Ok(bounds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(42.5, -75.0));
        assert!(validate_coordinates(-90.0, 180.0));
        assert!(!validate_coordinates(90.1, 0.0));
        assert!(!validate_coordinates(0.0, -180.5));
    }

    #[test]
    fn test_distance_zero() {
        assert!(distance_nm(42.5, -75.0, 42.5, -75.0) < 1e-9);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        // One degree of latitude is 60 nautical miles by definition.
        let d = distance_nm(42.0, -75.0, 43.0, -75.0);
        assert!((d - 60.0).abs() < 0.2, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal() {
        assert!((bearing_deg(40.0, -75.0, 41.0, -75.0) - 0.0).abs() < 0.1); // north
        assert!((bearing_deg(41.0, -75.0, 40.0, -75.0) - 180.0).abs() < 0.1); // south
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 0.1); // east
    }

    #[test]
    fn test_bounds_parse() {
        let b: GeoBounds = "40,-80,45,-70".parse().unwrap();
        assert_eq!(
            b,
            GeoBounds {
                south: 40.0,
                west: -80.0,
                north: 45.0,
                east: -70.0
            }
        );
    }

    #[test]
    fn test_bounds_parse_rejects() {
        assert!("40,-80,45".parse::<GeoBounds>().is_err()); // wrong arity
        assert!("a,b,c,d".parse::<GeoBounds>().is_err()); // non-numeric
        assert!("45,-80,40,-70".parse::<GeoBounds>().is_err()); // south > north
        assert!("40,-60,45,-70".parse::<GeoBounds>().is_err()); // west > east
        assert!("40,-200,45,-70".parse::<GeoBounds>().is_err()); // out of range
    }

    #[test]
    fn test_bounds_contains() {
        let b: GeoBounds = "40,-80,45,-70".parse().unwrap();
        assert!(b.contains(42.0, -75.0));
        assert!(b.contains(40.0, -80.0)); // inclusive edges
        assert!(!b.contains(50.0, -75.0));
        assert!(!b.contains(42.0, -60.0));
    }
}
