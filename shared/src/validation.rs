//! Parsing and validation utilities for observation data
//!
//! Survey exports are hand-maintained spreadsheets, so everything in here is
//! lenient: malformed input yields `None` (or an `Err` message) and never
//! panics.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::Severity;
use crate::types::GpsCoordinates;

// ============================================================================
// Coordinates
// ============================================================================

fn dms_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+)\D+?(\d+)\D+?(\d+(?:\.\d*)?)[^\dNnSsEeWw]*([NnSsEeWw])").ok())
        .as_ref()
}

/// Convert a degrees/minutes/seconds coordinate into signed decimal degrees.
///
/// Accepts shapes like `61° 5' 24.14" N`, `61 5 24.14 n` or `24°57'26.17"E`.
/// Southern and western hemispheres are negative. Returns `None` when no
/// coordinate can be found in the text.
pub fn parse_dms(text: &str) -> Option<f64> {
    let cleaned = text.replace('"', "");
    let cleaned = cleaned.trim().trim_matches('\'').trim();

    let caps = dms_pattern()?.captures(cleaned)?;
    let degrees: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    let hemisphere = caps.get(4)?.as_str().to_ascii_uppercase();

    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if hemisphere == "S" || hemisphere == "W" {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Parse an optional coordinate cell. Missing cells behave like malformed ones.
pub fn parse_dms_opt(text: Option<&str>) -> Option<f64> {
    text.and_then(parse_dms)
}

/// Split a combined `"DMS, DMS"` cell into latitude and longitude.
///
/// Each half is parsed independently, so one bad half does not hide the other.
pub fn split_coordinate_pair(text: &str) -> (Option<f64>, Option<f64>) {
    let cleaned = text.replace('"', "");
    let mut parts = cleaned.trim().split(',');
    let latitude = parts.next().and_then(parse_dms);
    let longitude = parts.next().and_then(parse_dms);
    (latitude, longitude)
}

/// Validate a latitude/longitude pair
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), &'static str> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err("Coordinates must be finite numbers");
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Parse and validate a combined coordinate cell in one step
pub fn parse_coordinate_cell(text: &str) -> Option<GpsCoordinates> {
    match split_coordinate_pair(text) {
        (Some(lat), Some(lon)) if validate_coordinates(lat, lon).is_ok() => {
            Some(GpsCoordinates::new(lat, lon))
        }
        _ => None,
    }
}

// ============================================================================
// Dates
// ============================================================================

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Parse an observation or query date, discarding any time of day.
///
/// Accepts ISO dates and date-times (with or without offset) and the Finnish
/// day-first `D.M.YYYY` form.
pub fn parse_flexible_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    None
}

// ============================================================================
// Severity
// ============================================================================

/// Coerce a severity cell to a level.
///
/// Numeric text like `2`, `2.0` or `2,0` is accepted; anything that is not a
/// whole number in 0..=3 yields `None`.
pub fn parse_severity(text: &str) -> Option<Severity> {
    let normalized = text.trim().replace(',', ".");
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    if !(0.0..=3.0).contains(&value) {
        return None;
    }
    Severity::new(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ========================================================================
    // Coordinate Tests
    // ========================================================================

    #[test]
    fn test_parse_dms_reference_point() {
        let value = parse_dms("61° 5' 24.14\" N").unwrap();
        assert!((value - 61.0900389).abs() < 1e-6);
    }

    #[test]
    fn test_parse_dms_southern_and_western() {
        assert!(parse_dms("33° 52' 4.2\" S").unwrap() < 0.0);
        assert!(parse_dms("70° 15' 0\" w").unwrap() < 0.0);
    }

    #[test]
    fn test_parse_dms_hemisphere_glued_to_seconds() {
        let value = parse_dms("24°57'26.17E").unwrap();
        assert!((value - 24.957269).abs() < 1e-5);
    }

    #[test]
    fn test_parse_dms_quoted_input() {
        let value = parse_dms("  '61° 5' 24\" N'  ").unwrap();
        assert!((value - (61.0 + 5.0 / 60.0 + 24.0 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn test_parse_dms_malformed() {
        assert_eq!(parse_dms(""), None);
        assert_eq!(parse_dms("nan"), None);
        assert_eq!(parse_dms("61.0900"), None);
        assert_eq!(parse_dms("61° 5' 24.14\""), None);
        assert_eq!(parse_dms_opt(None), None);
    }

    #[test]
    fn test_split_coordinate_pair() {
        let (lat, lon) = split_coordinate_pair("\"61° 5' 24.14\" N, 24° 57' 26.17\" E\"");
        assert!((lat.unwrap() - 61.0900).abs() < 1e-3);
        assert!((lon.unwrap() - 24.9573).abs() < 1e-3);
    }

    #[test]
    fn test_split_coordinate_pair_missing_half() {
        let (lat, lon) = split_coordinate_pair("61° 5' 24.14\" N");
        assert!(lat.is_some());
        assert!(lon.is_none());
    }

    #[test]
    fn test_parse_coordinate_cell_out_of_range() {
        assert!(parse_coordinate_cell("95° 0' 0\" N, 24° 0' 0\" E").is_none());
        assert!(parse_coordinate_cell("60° 0' 0\" N, 24° 0' 0\" E").is_some());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(61.09, 24.95).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.5, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    // ========================================================================
    // Date Tests
    // ========================================================================

    #[test]
    fn test_parse_flexible_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 28).unwrap();
        assert_eq!(parse_flexible_date("2025-06-28T17:22:00"), Some(expected));
        assert_eq!(parse_flexible_date("2025-06-28T17:22:00.123"), Some(expected));
        assert_eq!(parse_flexible_date("2025-06-28T17:22:00+03:00"), Some(expected));
        assert_eq!(parse_flexible_date("2025-06-28 17:22"), Some(expected));
        assert_eq!(parse_flexible_date("2025-06-28"), Some(expected));
        assert_eq!(parse_flexible_date("28.6.2025"), Some(expected));
        assert_eq!(parse_flexible_date("28.06.2025 17:22"), Some(expected));
    }

    #[test]
    fn test_parse_flexible_date_rejects_garbage() {
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("yesterday"), None);
        assert_eq!(parse_flexible_date("2025-13-40"), None);
    }

    // ========================================================================
    // Severity Tests
    // ========================================================================

    #[test]
    fn test_parse_severity() {
        assert_eq!(parse_severity("0").map(|s| s.level()), Some(0));
        assert_eq!(parse_severity(" 3 ").map(|s| s.level()), Some(3));
        assert_eq!(parse_severity("2.0").map(|s| s.level()), Some(2));
        assert_eq!(parse_severity("1,0").map(|s| s.level()), Some(1));
        assert_eq!(parse_severity("4"), None);
        assert_eq!(parse_severity("-1"), None);
        assert_eq!(parse_severity("1.5"), None);
        assert_eq!(parse_severity("runsas"), None);
        assert_eq!(parse_severity(""), None);
    }

    // ========================================================================
    // Property Tests
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_northern_eastern_non_negative(
            deg in 0u32..90,
            min in 0u32..60,
            sec in 0.0f64..60.0,
            hemi in prop_oneof![Just('N'), Just('E'), Just('n'), Just('e')],
        ) {
            let text = format!("{}° {}' {:.2}\" {}", deg, min, sec, hemi);
            let value = parse_dms(&text);
            prop_assert!(value.is_some(), "failed to parse {}", text);
            prop_assert!(value.unwrap() >= 0.0);
        }

        #[test]
        fn prop_southern_western_non_positive(
            deg in 0u32..90,
            min in 0u32..60,
            sec in 0.0f64..60.0,
            hemi in prop_oneof![Just('S'), Just('W'), Just('s'), Just('w')],
        ) {
            let text = format!("{}° {}' {:.2}\" {}", deg, min, sec, hemi);
            let value = parse_dms(&text);
            prop_assert!(value.is_some(), "failed to parse {}", text);
            prop_assert!(value.unwrap() <= 0.0);
        }

        #[test]
        fn prop_parse_dms_never_panics(text in "\\PC*") {
            let _ = parse_dms(&text);
            let _ = split_coordinate_pair(&text);
        }

        #[test]
        fn prop_text_without_hemisphere_is_rejected(text in "[0-9 .°'\"]{0,30}") {
            prop_assert_eq!(parse_dms(&text), None);
        }
    }
}
