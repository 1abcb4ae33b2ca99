//! Month-typical weather for a location
//!
//! Prediction has no live weather for the queried day, so it uses the
//! average weather seen at the nearest observation stations in the same
//! calendar month.

use std::collections::HashSet;

use shared::{EnrichedObservation, GpsCoordinates, WeatherWindow};

use crate::error::{AppError, AppResult};

/// Fewer nearby rows than this triggers the all-stations fallback
pub const MIN_NEIGHBOR_ROWS: usize = 5;

#[derive(Debug, Clone, Copy)]
struct HistoricalRow {
    station: GpsCoordinates,
    month: u32,
    weather: WeatherWindow,
}

/// Averaged weather and how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalEstimate {
    pub weather: WeatherWindow,
    pub rows_used: usize,
    /// True when the nearby stations had too few rows and the whole month was used
    pub fallback: bool,
}

/// Nearest-station weather averages over the enriched corpus
#[derive(Debug, Clone)]
pub struct HistoricalAverager {
    rows: Vec<HistoricalRow>,
    stations: Vec<GpsCoordinates>,
    k: usize,
}

impl HistoricalAverager {
    /// Index the corpus rows that carry weather
    pub fn new(corpus: &[EnrichedObservation], k: usize) -> Self {
        let mut seen = HashSet::new();
        let mut stations = Vec::new();
        let mut rows = Vec::new();

        for record in corpus {
            let Some(weather) = record.weather else {
                continue;
            };
            let station = record.observation.coordinates();
            if seen.insert((station.latitude.to_bits(), station.longitude.to_bits())) {
                stations.push(station);
            }
            rows.push(HistoricalRow {
                station,
                month: record.observation.month(),
                weather,
            });
        }

        Self {
            rows,
            stations,
            k: k.max(1),
        }
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Up to `k` distinct stations closest to `point`, nearest first.
    ///
    /// Distance is planar in degrees; equal distances keep corpus order.
    pub fn nearest_stations(&self, point: GpsCoordinates) -> Vec<GpsCoordinates> {
        let mut ranked: Vec<(f64, GpsCoordinates)> = self
            .stations
            .iter()
            .map(|s| (s.squared_degree_distance(&point), *s))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.into_iter().take(self.k).map(|(_, s)| s).collect()
    }

    /// Average weather near `point` in `month` (1-12)
    pub fn estimate(&self, point: GpsCoordinates, month: u32) -> AppResult<HistoricalEstimate> {
        let nearest = self.nearest_stations(point);
        let nearby: Vec<&HistoricalRow> = self
            .rows
            .iter()
            .filter(|r| r.month == month && nearest.contains(&r.station))
            .collect();

        if nearby.len() >= MIN_NEIGHBOR_ROWS {
            return Ok(HistoricalEstimate {
                weather: mean_window(&nearby),
                rows_used: nearby.len(),
                fallback: false,
            });
        }

        tracing::warn!(
            "Only {} rows near ({:.4}, {:.4}) for month {}; using the all-stations monthly mean",
            nearby.len(),
            point.latitude,
            point.longitude,
            month
        );

        let monthly: Vec<&HistoricalRow> = self.rows.iter().filter(|r| r.month == month).collect();
        if monthly.is_empty() {
            return Err(AppError::DataUnavailable(format!(
                "no weather history for month {}",
                month
            )));
        }

        Ok(HistoricalEstimate {
            weather: mean_window(&monthly),
            rows_used: monthly.len(),
            fallback: true,
        })
    }
}

fn mean_window(rows: &[&HistoricalRow]) -> WeatherWindow {
    let n = rows.len() as f64;
    WeatherWindow::new(
        rows.iter().map(|r| r.weather.avg_temp_7d).sum::<f64>() / n,
        rows.iter().map(|r| r.weather.precip_sum_7d).sum::<f64>() / n,
        rows.iter().map(|r| r.weather.wind_mean_7d).sum::<f64>() / n,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::{Observation, Severity};

    fn row(lat: f64, lon: f64, month: u32, temp: f64) -> EnrichedObservation {
        EnrichedObservation {
            observation: Observation {
                station: format!("{lat},{lon}"),
                region: String::new(),
                coordinate_text: String::new(),
                latitude: lat,
                longitude: lon,
                date: NaiveDate::from_ymd_opt(2022, month, 10).unwrap(),
                severity: Severity::NONE,
                severity_text: String::new(),
                tracking: String::new(),
                upkeep: String::new(),
                notes: String::new(),
            },
            weather: Some(WeatherWindow::new(temp, 1.0, 2.0)),
            daily: Vec::new(),
        }
    }

    #[test]
    fn test_nearest_stations_are_distinct() {
        let corpus = vec![
            row(60.0, 25.0, 7, 10.0),
            row(60.0, 25.0, 7, 12.0),
            row(61.0, 25.0, 7, 14.0),
        ];
        let averager = HistoricalAverager::new(&corpus, 5);
        assert_eq!(averager.station_count(), 2);
        assert_eq!(averager.nearest_stations(GpsCoordinates::new(60.9, 25.0))[0].latitude, 61.0);
    }

    #[test]
    fn test_uses_nearby_rows_when_enough() {
        let mut corpus: Vec<_> = (0..5).map(|i| row(60.0, 25.0, 7, 10.0 + i as f64)).collect();
        corpus.push(row(68.0, 27.0, 7, 100.0));
        let averager = HistoricalAverager::new(&corpus, 1);

        let estimate = averager.estimate(GpsCoordinates::new(60.1, 25.0), 7).unwrap();
        assert!(!estimate.fallback);
        assert_eq!(estimate.rows_used, 5);
        assert_eq!(estimate.weather.avg_temp_7d, 12.0);
    }

    #[test]
    fn test_falls_back_to_monthly_mean() {
        let corpus = vec![row(60.0, 25.0, 7, 10.0), row(68.0, 27.0, 7, 20.0), row(68.0, 27.0, 8, 99.0)];
        let averager = HistoricalAverager::new(&corpus, 1);

        let estimate = averager.estimate(GpsCoordinates::new(60.0, 25.0), 7).unwrap();
        assert!(estimate.fallback);
        assert_eq!(estimate.rows_used, 2);
        assert_eq!(estimate.weather.avg_temp_7d, 15.0);
    }

    #[test]
    fn test_empty_month_is_data_unavailable() {
        let corpus = vec![row(60.0, 25.0, 7, 10.0)];
        let averager = HistoricalAverager::new(&corpus, 5);
        assert!(matches!(
            averager.estimate(GpsCoordinates::new(60.0, 25.0), 1),
            Err(AppError::DataUnavailable(_))
        ));
    }
}
