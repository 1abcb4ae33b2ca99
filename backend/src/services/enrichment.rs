//! Weather enrichment of cleaned observations
//!
//! Each record is paired with a trailing-window summary of archive weather.
//! Records are independent: a failed lookup leaves that record without
//! weather and the batch carries on.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use shared::{DailyWeather, DateRange, EnrichedObservation, Observation, WeatherWindow};

use crate::external::weather::WeatherSource;

/// Log a progress line every this many records
const PROGRESS_EVERY: usize = 100;

/// Reason a single record could not be enriched
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentFailure {
    /// Request failed, timed out or the response was malformed
    Remote(String),
    /// Archive returned a number of days other than the window length
    WindowMismatch { expected: usize, received: usize },
    /// Aggregates were not finite
    NonFinite,
}

impl std::fmt::Display for EnrichmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentFailure::Remote(msg) => write!(f, "{}", msg),
            EnrichmentFailure::WindowMismatch { expected, received } => {
                write!(f, "expected {} days of weather, received {}", expected, received)
            }
            EnrichmentFailure::NonFinite => write!(f, "weather aggregates are not finite"),
        }
    }
}

/// Result of enriching a batch
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub records: Vec<EnrichedObservation>,
    pub enriched: usize,
    pub failed: usize,
}

/// Inclusive window of `window_days` ending on `date`
pub fn window_range(date: chrono::NaiveDate, window_days: u32) -> DateRange {
    let span = i64::from(window_days.max(1)) - 1;
    DateRange::new(date - ChronoDuration::days(span), date)
}

/// Mean temperature, summed precipitation and mean wind over a daily series
pub fn summarize_window(daily: &[DailyWeather]) -> Option<WeatherWindow> {
    if daily.is_empty() {
        return None;
    }
    let n = daily.len() as f64;
    let window = WeatherWindow::new(
        daily.iter().map(|d| d.temperature_mean).sum::<f64>() / n,
        daily.iter().map(|d| d.precipitation_sum).sum::<f64>(),
        daily.iter().map(|d| d.wind_speed_mean).sum::<f64>() / n,
    );
    window.is_finite().then_some(window)
}

/// Enriches observations one at a time against a weather source
pub struct WeatherEnricher<'a> {
    source: &'a dyn WeatherSource,
    window_days: u32,
    request_delay: Duration,
}

impl<'a> WeatherEnricher<'a> {
    pub fn new(source: &'a dyn WeatherSource, window_days: u32, request_delay: Duration) -> Self {
        Self {
            source,
            window_days: window_days.max(1),
            request_delay,
        }
    }

    /// Attach the trailing-window weather to one record
    pub async fn enrich_one(
        &self,
        observation: Observation,
    ) -> Result<EnrichedObservation, (Observation, EnrichmentFailure)> {
        let range = window_range(observation.date, self.window_days);

        let daily = match self
            .source
            .daily_series(observation.coordinates(), range)
            .await
        {
            Ok(daily) => daily,
            Err(e) => return Err((observation, EnrichmentFailure::Remote(e.to_string()))),
        };

        let expected = self.window_days as usize;
        if daily.len() != expected {
            return Err((
                observation,
                EnrichmentFailure::WindowMismatch {
                    expected,
                    received: daily.len(),
                },
            ));
        }

        match summarize_window(&daily) {
            Some(window) => Ok(EnrichedObservation {
                observation,
                weather: Some(window),
                daily,
            }),
            None => Err((observation, EnrichmentFailure::NonFinite)),
        }
    }

    /// Enrich a batch sequentially, pausing between requests
    pub async fn enrich_all(&self, observations: Vec<Observation>) -> EnrichmentOutcome {
        let total = observations.len();
        let mut outcome = EnrichmentOutcome {
            records: Vec::with_capacity(total),
            ..Default::default()
        };

        tracing::info!("Fetching weather for {} observations", total);

        for (index, observation) in observations.into_iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match self.enrich_one(observation).await {
                Ok(enriched) => {
                    outcome.enriched += 1;
                    outcome.records.push(enriched);
                }
                Err((observation, failure)) => {
                    tracing::debug!(
                        "No weather for {} on {}: {}",
                        observation.station,
                        observation.date,
                        failure
                    );
                    outcome.failed += 1;
                    outcome.records.push(EnrichedObservation::unenriched(observation));
                }
            }

            let done = index + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                tracing::info!("Processed {}/{} observations", done, total);
            }
        }

        tracing::info!(
            "Weather attached to {}/{} observations",
            outcome.enriched,
            total
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32, t: f64, p: f64, w: f64) -> DailyWeather {
        DailyWeather {
            date: NaiveDate::from_ymd_opt(2022, 7, d).unwrap(),
            temperature_mean: t,
            precipitation_sum: p,
            wind_speed_mean: w,
        }
    }

    #[test]
    fn test_window_range_is_inclusive() {
        let range = window_range(NaiveDate::from_ymd_opt(2022, 7, 15).unwrap(), 7);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2022, 7, 9).unwrap());
        assert_eq!(range.len_days(), 7);
    }

    #[test]
    fn test_precipitation_is_summed_not_averaged() {
        let daily = vec![day(1, 10.0, 1.0, 2.0), day(2, 20.0, 3.0, 4.0)];
        let window = summarize_window(&daily).unwrap();
        assert_eq!(window.avg_temp_7d, 15.0);
        assert_eq!(window.precip_sum_7d, 4.0);
        assert_eq!(window.wind_mean_7d, 3.0);
    }

    #[test]
    fn test_empty_series_has_no_window() {
        assert!(summarize_window(&[]).is_none());
    }
}
