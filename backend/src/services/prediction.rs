//! Severity prediction for a place and day

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use shared::{
    parse_flexible_date, validate_coordinates, GpsCoordinates, PredictionQuery,
    PredictionResponse, Severity, SEVERITY_LABELS,
};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::boosting::argmax;
use crate::services::classifier::SeverityClassifier;
use crate::services::corpus::read_corpus;
use crate::services::features::FeatureVector;
use crate::services::historical::HistoricalAverager;

/// Parse a query date, trying the day-first `D.M.YYYY` form before ISO
pub fn parse_query_date(text: &str) -> AppResult<NaiveDate> {
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, "%d.%m.%Y")
        .ok()
        .or_else(|| parse_flexible_date(trimmed))
        .ok_or_else(|| AppError::InvalidDate(trimmed.to_string()))
}

/// Loaded model plus the weather history it predicts from
pub struct PredictionService {
    classifier: SeverityClassifier,
    averager: HistoricalAverager,
}

impl PredictionService {
    pub fn new(classifier: SeverityClassifier, averager: HistoricalAverager) -> Self {
        Self {
            classifier,
            averager,
        }
    }

    /// Load the model artifact and the enriched corpus named in the configuration
    pub fn load(config: &Config) -> AppResult<Self> {
        let classifier = SeverityClassifier::load(&config.model_path)?;
        let corpus = read_corpus(&config.enriched_corpus_path)?;
        let averager = HistoricalAverager::new(&corpus, config.nearest_neighbor_k);

        tracing::info!(
            "Prediction service ready: {} history rows from {} stations",
            averager.row_count(),
            averager.station_count()
        );

        Ok(Self::new(classifier, averager))
    }

    pub fn classifier(&self) -> &SeverityClassifier {
        &self.classifier
    }

    /// Most likely severity at a place on a day, with the full distribution
    pub fn predict(&self, query: &PredictionQuery) -> AppResult<PredictionResponse> {
        let date = parse_query_date(&query.date)?;

        if !query.lat.is_finite() || !query.lon.is_finite() {
            return Err(AppError::validation(
                "coordinates",
                "Coordinates must be numbers",
                "Koordinaattien on oltava lukuja",
            ));
        }
        validate_coordinates(query.lat, query.lon).map_err(|msg| {
            AppError::validation("coordinates", msg, "Koordinaatit ovat sallitun alueen ulkopuolella")
        })?;

        let point = GpsCoordinates::new(query.lat, query.lon);
        let estimate = self.averager.estimate(point, date.month())?;

        let features = FeatureVector::build(query.lat, query.lon, &estimate.weather, date);
        let probabilities = self.classifier.predict_proba(&features);
        let level = argmax(&probabilities);

        let probability_by_class: BTreeMap<String, f64> = SEVERITY_LABELS
            .iter()
            .zip(probabilities)
            .map(|(label, p)| (label.to_string(), p))
            .collect();

        let severity = Severity::new(level as u8).unwrap_or(Severity::NONE);

        tracing::debug!(
            "Predicted {} for {} on {} (fallback: {})",
            severity,
            query.label,
            date,
            estimate.fallback
        );

        Ok(PredictionResponse {
            location: query.label.clone(),
            date: date.format("%d.%m.%Y").to_string(),
            weather_used: estimate.weather,
            weather_fallback: estimate.fallback,
            weather_rows: estimate.rows_used,
            predicted_class: severity.label().to_string(),
            predicted_level: severity.level(),
            probability_by_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 7, 5).unwrap();
        assert_eq!(parse_query_date("5.7.2024").unwrap(), expected);
        assert_eq!(parse_query_date("05.07.2024").unwrap(), expected);
        assert_eq!(parse_query_date("2024-07-05").unwrap(), expected);
        assert_eq!(parse_query_date("2024-07-05T12:30:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_query_date_rejects_garbage() {
        assert!(matches!(
            parse_query_date("next tuesday"),
            Err(AppError::InvalidDate(_))
        ));
        assert!(parse_query_date("31.2.2024").is_err());
    }
}
