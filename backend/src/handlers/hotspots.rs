//! HTTP handlers for the hotspot map

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{validate_coordinates, GpsCoordinates, StationRisk};

use crate::error::{AppError, AppResult};
use crate::services::hotspot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HotspotListQuery {
    /// Include stations that are not flagged
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub lat: f64,
    pub lon: f64,
    /// Only consider flagged stations
    #[serde(default)]
    pub hotspots_only: bool,
}

/// Station risk rows, highest risk first
pub async fn list_hotspots(
    State(state): State<AppState>,
    Query(query): Query<HotspotListQuery>,
) -> Json<Vec<StationRisk>> {
    Json(hotspot::list(&state.hotspots, query.all))
}

/// Station closest to a clicked map point
pub async fn nearest_station(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> AppResult<Json<StationRisk>> {
    validate_coordinates(query.lat, query.lon).map_err(|msg| {
        AppError::validation("coordinates", msg, "Koordinaatit ovat sallitun alueen ulkopuolella")
    })?;

    let point = GpsCoordinates::new(query.lat, query.lon);
    let station = hotspot::nearest(&state.hotspots, point, query.hotspots_only)?;
    Ok(Json(station))
}
