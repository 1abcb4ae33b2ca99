//! Weekly bulletin and local situation summaries
//!
//! Both select a slice of observations, compute a few counts and hand the
//! records to the summarizer. A summarizer failure is reported next to the
//! data instead of failing the request.

use std::sync::{Arc, OnceLock};

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;
use shared::{GpsCoordinates, Observation};

use crate::error::{AppError, AppResult};
use crate::external::summarizer::{Summarizer, SummaryKind};
use crate::services::observations::ObservationStore;

/// Days before the latest observation covered by the weekly bulletin
pub const WEEKLY_WINDOW_DAYS: i64 = 20;

/// Default search radius for a local summary
pub const DEFAULT_LOCAL_RADIUS_KM: f64 = 10.0;

/// Observations passed to the summarizer for a local summary
pub const LOCAL_HISTORY_LEN: usize = 10;

/// Country-wide bulletin over the most recent observations
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyBulletin {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub observation_count: usize,
    /// Rows with any algae
    pub algae_present: usize,
    /// Rows at level 2 or 3
    pub heavy_bloom: usize,
    /// Newest first
    pub observations: Vec<Observation>,
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

/// Situation around one point
#[derive(Debug, Clone, Serialize)]
pub struct LocalAnalysis {
    /// Nearest station name without its site code
    pub place: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub total_observations: usize,
    /// Newest first, at most [`LOCAL_HISTORY_LEN`]
    pub recent: Vec<Observation>,
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

fn site_code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s*\([\d\.]+\)").ok()).as_ref()
}

/// `Ormajärvi (35.792.1.001)/Havaintopaikka 2` becomes `Ormajärvi/Havaintopaikka 2`
pub fn strip_site_code(station: &str) -> String {
    match site_code_pattern() {
        Some(pattern) => pattern.replace_all(station, "").trim().to_string(),
        None => station.trim().to_string(),
    }
}

/// Rows from the `WEEKLY_WINDOW_DAYS` days ending at the latest date, newest first
pub fn weekly_window(observations: &[Observation]) -> Option<(NaiveDate, NaiveDate, Vec<Observation>)> {
    let end = observations.iter().map(|o| o.date).max()?;
    let start = end - Duration::days(WEEKLY_WINDOW_DAYS);

    let mut selected: Vec<Observation> = observations
        .iter()
        .filter(|o| o.date >= start && o.date <= end)
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.date.cmp(&a.date));

    Some((start, end, selected))
}

#[derive(Clone)]
pub struct SummaryService {
    store: Arc<dyn ObservationStore>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl SummaryService {
    pub fn new(store: Arc<dyn ObservationStore>, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        Self { store, summarizer }
    }

    async fn summarize(&self, records: &[Observation], kind: &SummaryKind) -> (Option<String>, Option<String>) {
        let Some(summarizer) = &self.summarizer else {
            return (None, Some("Summarizer is not configured".to_string()));
        };

        match summarizer.summarize(records, kind).await {
            Ok(text) => (Some(text), None),
            Err(e) => {
                tracing::warn!("Summary failed: {}", e);
                (None, Some(e.to_string()))
            }
        }
    }

    /// Bulletin over the last weeks of observations
    pub async fn weekly(&self, today: NaiveDate) -> AppResult<WeeklyBulletin> {
        let observations = self.store.all().await?;
        let (start, end, selected) = weekly_window(&observations)
            .ok_or_else(|| AppError::DataUnavailable("no observations stored".to_string()))?;

        let algae_present = selected.iter().filter(|o| o.severity.is_present()).count();
        let heavy_bloom = selected.iter().filter(|o| o.severity.level() >= 2).count();

        tracing::info!(
            "Weekly bulletin {} - {}: {} observations",
            start,
            end,
            selected.len()
        );

        let kind = SummaryKind::Weekly { start, end, today };
        let (summary, summary_error) = self.summarize(&selected, &kind).await;

        Ok(WeeklyBulletin {
            start,
            end,
            observation_count: selected.len(),
            algae_present,
            heavy_bloom,
            observations: selected,
            summary,
            summary_error,
        })
    }

    /// Summary of observations within `radius_km` of a point
    pub async fn local(&self, point: GpsCoordinates, radius_km: f64, today: NaiveDate) -> AppResult<LocalAnalysis> {
        let observations = self.store.all().await?;

        let nearest = observations.iter().min_by(|a, b| {
            a.coordinates()
                .haversine_km(&point)
                .total_cmp(&b.coordinates().haversine_km(&point))
        });
        let Some(nearest) = nearest else {
            return Err(AppError::DataUnavailable("no observations stored".to_string()));
        };
        let place = strip_site_code(&nearest.station);

        let mut local: Vec<Observation> = observations
            .iter()
            .filter(|o| o.coordinates().haversine_km(&point) <= radius_km)
            .cloned()
            .collect();
        if local.is_empty() {
            return Err(AppError::NotFound(format!(
                "Observations within {} km of ({:.2}, {:.2})",
                radius_km, point.latitude, point.longitude
            )));
        }

        let total_observations = local.len();
        local.sort_by(|a, b| b.date.cmp(&a.date));
        local.truncate(LOCAL_HISTORY_LEN);

        let kind = SummaryKind::Local {
            place: place.clone(),
            radius_km,
            today,
            total_rows: total_observations,
        };
        let (summary, summary_error) = self.summarize(&local, &kind).await;

        Ok(LocalAnalysis {
            place,
            latitude: point.latitude,
            longitude: point.longitude,
            radius_km,
            total_observations,
            recent: local,
            summary,
            summary_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_site_code() {
        assert_eq!(
            strip_site_code("Ormajärvi (35.792.1.001)/Havaintopaikka 2"),
            "Ormajärvi/Havaintopaikka 2"
        );
        assert_eq!(strip_site_code("Vesijärvi"), "Vesijärvi");
    }
}
