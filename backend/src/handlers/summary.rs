//! HTTP handlers for narrative summaries

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use shared::{validate_coordinates, GpsCoordinates};

use crate::error::{AppError, AppResult};
use crate::services::summary::{LocalAnalysis, WeeklyBulletin, DEFAULT_LOCAL_RADIUS_KM};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LocalQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: Option<f64>,
}

/// Bulletin over the most recent weeks of observations
pub async fn weekly_bulletin(State(state): State<AppState>) -> AppResult<Json<WeeklyBulletin>> {
    let bulletin = state.summaries.weekly(Utc::now().date_naive()).await?;
    Ok(Json(bulletin))
}

/// Situation around a clicked point
pub async fn local_analysis(
    State(state): State<AppState>,
    Query(query): Query<LocalQuery>,
) -> AppResult<Json<LocalAnalysis>> {
    validate_coordinates(query.lat, query.lon).map_err(|msg| {
        AppError::validation("coordinates", msg, "Koordinaatit ovat sallitun alueen ulkopuolella")
    })?;

    let radius_km = query.radius_km.unwrap_or(DEFAULT_LOCAL_RADIUS_KM);
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(AppError::validation(
            "radius_km",
            "Radius must be a positive number of kilometres",
            "Säteen on oltava positiivinen luku kilometreinä",
        ));
    }

    let analysis = state
        .summaries
        .local(GpsCoordinates::new(query.lat, query.lon), radius_km, Utc::now().date_naive())
        .await?;
    Ok(Json(analysis))
}
