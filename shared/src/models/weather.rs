//! Weather data models

use serde::{Deserialize, Serialize};

/// Trailing-window weather summary attached to an observation.
///
/// All three values come from the same archive response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherWindow {
    /// Mean of daily mean air temperature (°C)
    pub avg_temp_7d: f64,
    /// Sum of daily precipitation (mm)
    pub precip_sum_7d: f64,
    /// Mean of daily mean wind speed at 10 m
    pub wind_mean_7d: f64,
}

impl WeatherWindow {
    pub fn new(avg_temp_7d: f64, precip_sum_7d: f64, wind_mean_7d: f64) -> Self {
        Self {
            avg_temp_7d,
            precip_sum_7d,
            wind_mean_7d,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.avg_temp_7d.is_finite() && self.precip_sum_7d.is_finite() && self.wind_mean_7d.is_finite()
    }
}

/// Rough surface water temperature from a daily air temperature series.
///
/// Water lags air: each day moves 10% of the way towards `air - 3.5 °C`,
/// starting 4 °C below the first day's air temperature.
pub fn simulate_water_temperature(air: &[f64]) -> Vec<f64> {
    let mut current = air.first().map(|t| t - 4.0).unwrap_or(5.0);
    air.iter()
        .map(|&t| {
            current = current * 0.9 + (t - 3.5) * 0.1;
            current
        })
        .collect()
}

/// Water above this temperature points to heat rather than nutrients as the bloom driver
pub const WARM_WATER_THRESHOLD_C: f64 = 19.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_water_first_day() {
        let water = simulate_water_temperature(&[20.0]);
        // start 16.0, then 16.0 * 0.9 + 16.5 * 0.1
        assert!((water[0] - 16.05).abs() < 1e-9);
    }

    #[test]
    fn test_simulate_water_converges_towards_air() {
        let air = vec![25.0; 200];
        let water = simulate_water_temperature(&air);
        assert!((water.last().unwrap() - 21.5).abs() < 1e-3);
    }

    #[test]
    fn test_simulate_water_empty() {
        assert!(simulate_water_temperature(&[]).is_empty());
    }
}
