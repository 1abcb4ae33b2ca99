//! Historical weather archive client
//!
//! Integrates with the Open-Meteo archive API for daily means of
//! temperature, precipitation and wind over a date range.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use shared::{DailyWeather, DateRange, GpsCoordinates};

use crate::config::WeatherConfig;
use crate::error::{AppError, AppResult};

/// Daily variables requested from the archive, in response order
pub const DAILY_VARIABLES: &str = "temperature_2m_mean,precipitation_sum,wind_speed_10m_mean";

/// Source of daily weather series
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Daily series covering `range` inclusive, one entry per day
    async fn daily_series(
        &self,
        location: GpsCoordinates,
        range: DateRange,
    ) -> AppResult<Vec<DailyWeather>>;
}

/// Open-Meteo archive API client
#[derive(Clone)]
pub struct OpenMeteoArchiveClient {
    client: Client,
    base_url: String,
}

/// Archive API response
#[derive(Debug, Deserialize)]
pub struct ArchiveResponse {
    pub daily: Option<ArchiveDaily>,
}

/// Parallel daily arrays; `null` entries are kept so they can be rejected
#[derive(Debug, Deserialize)]
pub struct ArchiveDaily {
    pub time: Option<Vec<String>>,
    pub temperature_2m_mean: Option<Vec<Option<f64>>>,
    pub precipitation_sum: Option<Vec<Option<f64>>>,
    pub wind_speed_10m_mean: Option<Vec<Option<f64>>>,
}

impl OpenMeteoArchiveClient {
    /// Create a new archive client with a bounded per-request timeout
    pub fn new(config: &WeatherConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.archive_url.clone(),
        })
    }

    fn request_url(&self, location: GpsCoordinates, range: DateRange) -> String {
        format!(
            "{}?latitude={:.6}&longitude={:.6}&start_date={}&end_date={}&daily={}&timezone=auto",
            self.base_url,
            location.latitude,
            location.longitude,
            range.start.format("%Y-%m-%d"),
            range.end.format("%Y-%m-%d"),
            DAILY_VARIABLES
        )
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoArchiveClient {
    async fn daily_series(
        &self,
        location: GpsCoordinates,
        range: DateRange,
    ) -> AppResult<Vec<DailyWeather>> {
        let url = self.request_url(location, range);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::WeatherUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WeatherUnavailable(format!(
                "Archive returned {}: {}",
                status, body
            )));
        }

        let data: ArchiveResponse = response.json().await.map_err(|e| {
            AppError::WeatherUnavailable(format!("Failed to parse archive response: {}", e))
        })?;

        parse_daily_series(data)
    }
}

/// Turn an archive response into a complete daily series.
///
/// Missing arrays, `null` values, unparseable dates and arrays of unequal
/// length are all rejected.
pub fn parse_daily_series(data: ArchiveResponse) -> AppResult<Vec<DailyWeather>> {
    let daily = data
        .daily
        .ok_or_else(|| AppError::WeatherUnavailable("Response has no daily block".to_string()))?;

    let missing = |name: &str| AppError::WeatherUnavailable(format!("Missing daily array {}", name));
    let time = daily.time.ok_or_else(|| missing("time"))?;
    let temperature = daily
        .temperature_2m_mean
        .ok_or_else(|| missing("temperature_2m_mean"))?;
    let precipitation = daily
        .precipitation_sum
        .ok_or_else(|| missing("precipitation_sum"))?;
    let wind = daily
        .wind_speed_10m_mean
        .ok_or_else(|| missing("wind_speed_10m_mean"))?;

    let days = time.len();
    if temperature.len() != days || precipitation.len() != days || wind.len() != days {
        return Err(AppError::WeatherUnavailable(format!(
            "Daily arrays differ in length (time {}, temperature {}, precipitation {}, wind {})",
            days,
            temperature.len(),
            precipitation.len(),
            wind.len()
        )));
    }

    time.iter()
        .zip(temperature)
        .zip(precipitation)
        .zip(wind)
        .map(|(((day, t), p), w)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
                AppError::WeatherUnavailable(format!("Unparseable archive date {}", day))
            })?;
            match (t, p, w) {
                (Some(t), Some(p), Some(w)) => Ok(DailyWeather {
                    date,
                    temperature_mean: t,
                    precipitation_sum: p,
                    wind_speed_mean: w,
                }),
                _ => Err(AppError::WeatherUnavailable(format!(
                    "Null value in archive data for {}",
                    day
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> ArchiveResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_complete_series() {
        let data = response(
            r#"{"daily": {
                "time": ["2022-07-14", "2022-07-15"],
                "temperature_2m_mean": [18.5, 20.1],
                "precipitation_sum": [0.0, 3.2],
                "wind_speed_10m_mean": [10.4, 12.0]
            }}"#,
        );

        let series = parse_daily_series(data).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].date, NaiveDate::from_ymd_opt(2022, 7, 15).unwrap());
        assert_eq!(series[1].precipitation_sum, 3.2);
    }

    #[test]
    fn test_null_value_is_rejected() {
        let data = response(
            r#"{"daily": {
                "time": ["2022-07-14"],
                "temperature_2m_mean": [null],
                "precipitation_sum": [0.0],
                "wind_speed_10m_mean": [10.4]
            }}"#,
        );
        assert!(matches!(
            parse_daily_series(data),
            Err(AppError::WeatherUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_array_is_rejected() {
        let data = response(
            r#"{"daily": {
                "time": ["2022-07-14"],
                "temperature_2m_mean": [18.0],
                "wind_speed_10m_mean": [10.4]
            }}"#,
        );
        assert!(parse_daily_series(data).is_err());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let data = response(
            r#"{"daily": {
                "time": ["2022-07-14", "2022-07-15"],
                "temperature_2m_mean": [18.0, 19.0],
                "precipitation_sum": [0.0],
                "wind_speed_10m_mean": [10.4, 9.0]
            }}"#,
        );
        assert!(parse_daily_series(data).is_err());
    }

    #[test]
    fn test_missing_daily_block() {
        let data = response(r#"{"error": true, "reason": "out of range"}"#);
        assert!(parse_daily_series(data).is_err());
    }

    #[test]
    fn test_request_url() {
        let config = WeatherConfig {
            archive_url: "https://archive.example/v1/archive".to_string(),
            timeout_secs: 20,
            request_delay_ms: 0,
        };
        let client = OpenMeteoArchiveClient::new(&config).unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2022, 7, 9).unwrap(),
            NaiveDate::from_ymd_opt(2022, 7, 15).unwrap(),
        );
        let url = client.request_url(GpsCoordinates::new(61.09, 24.95), range);

        assert!(url.starts_with("https://archive.example/v1/archive?latitude=61.090000"));
        assert!(url.contains("start_date=2022-07-09&end_date=2022-07-15"));
        assert!(url.contains("daily=temperature_2m_mean,precipitation_sum,wind_speed_10m_mean"));
        assert!(url.ends_with("timezone=auto"));
    }
}
