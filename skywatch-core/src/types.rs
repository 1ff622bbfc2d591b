//! Shared types, error enum, and ICAO address helpers for skywatch-core.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// All errors produced by skywatch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid ICAO address: {0}")]
    InvalidIcao(String),
    #[error("invalid bounds string: {0}")]
    InvalidBounds(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("feed error: {0}")]
    Feed(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("no positions matched the query")]
    NoData,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// ICAO address helpers
// ---------------------------------------------------------------------------

/// 24-bit ICAO aircraft address. Stored as raw bytes to avoid per-report
/// String allocation; canonical display form is 6 uppercase hex characters.
pub type Icao = [u8; 3];

/// Format ICAO address as 6-char uppercase hex string.
pub fn icao_to_string(icao: &Icao) -> String {
    format!("{:02X}{:02X}{:02X}", icao[0], icao[1], icao[2])
}

/// Parse and normalize an ICAO address string.
///
/// Short values are left-zero-padded to 6 characters; anything longer than
/// 6 characters or containing non-hex digits is rejected.
pub fn normalize_icao(raw: &str) -> Option<Icao> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 6 {
        return None;
    }
    // from_str_radix alone would also accept a leading '+'
    if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let val = u32::from_str_radix(trimmed, 16).ok()?;
    Some(icao_from_u32(val))
}

/// Build ICAO from a 24-bit integer.
pub fn icao_from_u32(val: u32) -> Icao {
    [
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ]
}

// ---------------------------------------------------------------------------
// Squawk codes
// ---------------------------------------------------------------------------

/// Check a transponder squawk code: exactly 4 octal digits.
pub fn is_valid_squawk(squawk: &str) -> bool {
    let s = squawk.trim();
    s.len() == 4 && s.bytes().all(|b| (b'0'..=b'7').contains(&b))
}

/// Emergency squawk lookup.
pub fn emergency_squawk(squawk: &str) -> Option<&'static str> {
    match squawk {
        "7500" => Some("Hijack"),
        "7600" => Some("Radio failure"),
        "7700" => Some("Emergency"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

/// Format altitude as a flight level above the transition altitude.
pub fn format_flight_level(altitude: Option<i32>) -> String {
    match altitude {
        None => "N/A".into(),
        Some(alt) if alt >= 18_000 => format!("FL{:03}", alt / 100),
        Some(alt) => format!("{alt}ft"),
    }
}

/// Format a UTC timestamp for table output.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_icao_roundtrip() {
        let icao = normalize_icao("4840D6").unwrap();
        assert_eq!(icao, [0x48, 0x40, 0xD6]);
        assert_eq!(icao_to_string(&icao), "4840D6");
    }

    #[test]
    fn test_normalize_icao_zero_pads() {
        assert_eq!(normalize_icao("ABC").unwrap(), [0x00, 0x0A, 0xBC]);
        assert_eq!(icao_to_string(&normalize_icao("1").unwrap()), "000001");
        assert_eq!(icao_to_string(&normalize_icao("abc123").unwrap()), "ABC123");
    }

    #[test]
    fn test_normalize_icao_rejects() {
        assert!(normalize_icao("").is_none());
        assert!(normalize_icao("   ").is_none());
        assert!(normalize_icao("ABC1234").is_none()); // too long
        assert!(normalize_icao("GHIJKL").is_none()); // non-hex
        assert!(normalize_icao("+BC123").is_none()); // sign is not a hex digit
        assert!(normalize_icao("-BC123").is_none());
    }

    #[test]
    fn test_icao_from_u32() {
        assert_eq!(icao_from_u32(0x4840D6), [0x48, 0x40, 0xD6]);
        assert_eq!(icao_from_u32(0x1), [0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_squawk_validation() {
        assert!(is_valid_squawk("7700"));
        assert!(is_valid_squawk("0000"));
        assert!(!is_valid_squawk("7800")); // 8 is not octal
        assert!(!is_valid_squawk("123")); // too short
        assert!(!is_valid_squawk("12345"));
        assert!(!is_valid_squawk("12a4"));
    }

    #[test]
    fn test_emergency_squawk() {
        assert_eq!(emergency_squawk("7700"), Some("Emergency"));
        assert!(emergency_squawk("1200").is_none());
    }

    #[test]
    fn test_format_flight_level() {
        assert_eq!(format_flight_level(Some(35_000)), "FL350");
        assert_eq!(format_flight_level(Some(18_000)), "FL180");
        assert_eq!(format_flight_level(Some(4_500)), "4500ft");
        assert_eq!(format_flight_level(None), "N/A");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-01 12:30:05 UTC");
    }
}
