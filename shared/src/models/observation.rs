//! Algae bloom observation models

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{Severity, WeatherWindow};
use crate::types::GpsCoordinates;

/// One cleaned survey record.
///
/// Every field the downstream pipeline relies on (date, coordinates,
/// severity) is guaranteed present; the rest is carried through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation site, e.g. `Ormajärvi (35.792.1.001)/Havaintopaikka 2`
    pub station: String,
    /// Regional authority (ELY centre) responsible for the site
    pub region: String,
    /// Coordinate text as it appeared in the source file
    pub coordinate_text: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
    pub severity: Severity,
    pub severity_text: String,
    pub tracking: String,
    pub upkeep: String,
    pub notes: String,
}

impl Observation {
    pub fn coordinates(&self) -> GpsCoordinates {
        GpsCoordinates::new(self.latitude, self.longitude)
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// 1-based day of the year
    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

/// Single day of archive weather, kept for auditing enrichment results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub temperature_mean: f64,
    pub precipitation_sum: f64,
    pub wind_speed_mean: f64,
}

/// Observation with its trailing-window weather summary.
///
/// `weather` is `None` when enrichment failed or was skipped; a window is
/// never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedObservation {
    pub observation: Observation,
    pub weather: Option<WeatherWindow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub daily: Vec<DailyWeather>,
}

impl EnrichedObservation {
    pub fn unenriched(observation: Observation) -> Self {
        Self {
            observation,
            weather: None,
            daily: Vec::new(),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.weather.is_some()
    }
}
