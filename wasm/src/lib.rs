//! WebAssembly module for the Algae Bloom Risk dashboard
//!
//! Provides client-side computation for:
//! - DMS coordinate parsing
//! - Hotspot scoring and marker colours
//! - Simulated surface water temperature

use js_sys::Float64Array;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Parse one DMS coordinate into decimal degrees
#[wasm_bindgen]
pub fn parse_coordinate(text: &str) -> Option<f64> {
    parse_dms(text)
}

/// Parse a `"DMS, DMS"` cell into `[lat, lon]`, or an empty array when invalid
#[wasm_bindgen]
pub fn parse_coordinate_pair(text: &str) -> Vec<f64> {
    match parse_coordinate_cell(text) {
        Some(point) => vec![point.latitude, point.longitude],
        None => Vec::new(),
    }
}

/// Marker colour for a station's risk number
#[wasm_bindgen]
pub fn marker_color(risk_number: u32) -> String {
    risk_color(risk_number).to_string()
}

/// Score stations from a JSON array of observations; returns the report as JSON
#[wasm_bindgen]
pub fn hotspot_report(observations_json: &str) -> Result<String, JsValue> {
    let observations: Vec<Observation> = serde_json::from_str(observations_json).map_err(|e| {
        web_sys::console::warn_1(&JsValue::from_str("hotspot_report: observations rejected"));
        JsValue::from_str(&format!("Invalid observations JSON: {}", e))
    })?;

    let report = HotspotReport::from_observations(&observations);
    serde_json::to_string(&report).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Daily water temperature estimate for a daily air temperature series
#[wasm_bindgen]
pub fn water_temperature(air: &[f64]) -> Vec<f64> {
    simulate_water_temperature(air)
}

/// Same as [`water_temperature`], reading and writing typed arrays directly
#[wasm_bindgen]
pub fn water_temperature_array(air: &Float64Array) -> Float64Array {
    let water = simulate_water_temperature(&air.to_vec());
    Float64Array::from(water.as_slice())
}

/// Whether the simulated water is warm enough to point to heat as the bloom driver
#[wasm_bindgen]
pub fn is_warm_water(water_temp_c: f64) -> bool {
    water_temp_c > WARM_WATER_THRESHOLD_C
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate_pair() {
        let pair = parse_coordinate_pair("61° 5' 24.14\" N, 24° 57' 26.17\" E");
        assert_eq!(pair.len(), 2);
        assert!((pair[0] - 61.0900389).abs() < 1e-6);

        assert!(parse_coordinate_pair("61 N").is_empty());
    }

    #[test]
    fn test_marker_color() {
        assert_eq!(marker_color(13), "#8B0000");
        assert_eq!(marker_color(2), "#FCFC07");
    }

    #[test]
    fn test_water_temperature_tracks_air() {
        let water = water_temperature(&[20.0; 30]);
        assert_eq!(water.len(), 30);
        assert!(water[29] > water[0]);
        assert!(water[29] < 16.5);
        assert!(!is_warm_water(water[29]));
    }
}
