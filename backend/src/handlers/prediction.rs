//! HTTP handlers for severity predictions

use axum::{extract::State, Json};
use serde::Deserialize;
use shared::{PredictionQuery, PredictionResponse};
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Prediction request body
#[derive(Debug, Deserialize, Validate)]
pub struct PredictionRequest {
    /// `D.M.YYYY` or `YYYY-MM-DD`
    #[validate(length(min = 1, max = 32))]
    pub date: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    /// Display name of the place; defaults to the coordinates
    #[validate(length(max = 200))]
    pub label: Option<String>,
}

impl From<PredictionRequest> for PredictionQuery {
    fn from(req: PredictionRequest) -> Self {
        let label = req
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| format!("{:.4}, {:.4}", req.lat, req.lon));
        PredictionQuery {
            date: req.date,
            lat: req.lat,
            lon: req.lon,
            label,
        }
    }
}

/// First failing field of a derived validation
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors
        .field_errors()
        .keys()
        .next()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "request".to_string());
    AppError::validation(
        &field,
        format!("Invalid value for {}", field),
        format!("Virheellinen arvo kentässä {}", field),
    )
}

/// Predict the bloom severity for a place and day
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> AppResult<Json<PredictionResponse>> {
    request.validate().map_err(validation_error)?;

    let predictor = state.predictor.as_ref().ok_or(AppError::ModelNotLoaded)?;
    let response = predictor.predict(&request.into())?;
    Ok(Json(response))
}
