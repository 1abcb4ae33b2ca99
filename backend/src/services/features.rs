//! Feature vector construction
//!
//! Training and inference both build their inputs through
//! [`FeatureVector::build`], so the column order below is the single source
//! of truth. Changing it invalidates every stored model.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use shared::{EnrichedObservation, WeatherWindow};

/// Number of model inputs
pub const FEATURE_COUNT: usize = 8;

/// Model input names, in column order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "latitude",
    "longitude",
    "avg_temp_7d",
    "precip_sum_7d",
    "wind_mean_7d",
    "day_sin",
    "day_cos",
    "year",
];

/// Days per seasonal cycle; leap days are not special-cased
const DAYS_PER_CYCLE: f64 = 365.0;

/// Seasonal position of a 1-based day of the year as `(sin, cos)`
pub fn day_of_year_cycle(day_of_year: u32) -> (f64, f64) {
    let angle = 2.0 * PI * f64::from(day_of_year) / DAYS_PER_CYCLE;
    (angle.sin(), angle.cos())
}

/// Fixed-order model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn build(latitude: f64, longitude: f64, weather: &WeatherWindow, date: NaiveDate) -> Self {
        let (day_sin, day_cos) = day_of_year_cycle(date.ordinal());
        Self([
            latitude,
            longitude,
            weather.avg_temp_7d,
            weather.precip_sum_7d,
            weather.wind_mean_7d,
            day_sin,
            day_cos,
            f64::from(date.year()),
        ])
    }

    /// Features for a corpus row, or `None` when it carries no weather
    pub fn from_enriched(record: &EnrichedObservation) -> Option<Self> {
        let weather = record.weather.as_ref()?;
        let obs = &record.observation;
        Some(Self::build(obs.latitude, obs.longitude, weather, obs.date))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps_at_year_end() {
        let (sin, cos) = day_of_year_cycle(365);
        assert!(sin.abs() < 1e-9);
        assert!((cos - 1.0).abs() < 1e-9);

        let (sin, _) = day_of_year_cycle(91);
        assert!(sin > 0.99);
    }

    #[test]
    fn test_feature_order() {
        let weather = WeatherWindow::new(18.0, 12.5, 3.4);
        let date = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
        let features = FeatureVector::build(61.09, 24.95, &weather, date);

        assert_eq!(features.0[0], 61.09);
        assert_eq!(features.0[1], 24.95);
        assert_eq!(features.0[2], 18.0);
        assert_eq!(features.0[3], 12.5);
        assert_eq!(features.0[4], 3.4);
        assert_eq!(features.0[7], 2023.0);
        assert_eq!(FEATURE_NAMES[5], "day_sin");
    }
}
