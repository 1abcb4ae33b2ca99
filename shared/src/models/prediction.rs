//! Severity prediction request/response models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::WeatherWindow;

/// Prediction query as sent by the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionQuery {
    /// `D.M.YYYY` or ISO `YYYY-MM-DD`
    pub date: String,
    pub lat: f64,
    pub lon: f64,
    /// Display name of the queried place
    pub label: String,
}

/// Prediction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub location: String,
    /// Normalized `DD.MM.YYYY`
    pub date: String,
    /// Month-typical weather used in place of live observations
    pub weather_used: WeatherWindow,
    /// True when too few nearby rows existed and the all-stations monthly mean was used
    pub weather_fallback: bool,
    /// Number of historical rows averaged into `weather_used`
    pub weather_rows: usize,
    pub predicted_class: String,
    pub predicted_level: u8,
    pub probability_by_class: BTreeMap<String, f64>,
}
