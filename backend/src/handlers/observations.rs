//! HTTP handlers for observation queries

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::Observation;

use crate::error::{AppError, AppResult};
use crate::services::prediction::parse_query_date;
use crate::AppState;

/// Query parameters for observations by region and day
#[derive(Debug, Deserialize)]
pub struct RegionDateQuery {
    /// Part of the regional authority name, case-insensitive
    pub region: String,
    pub date: String,
}

/// Observations of one region on one day
pub async fn list_by_region_and_date(
    State(state): State<AppState>,
    Query(query): Query<RegionDateQuery>,
) -> AppResult<Json<Vec<Observation>>> {
    if query.region.trim().is_empty() {
        return Err(AppError::validation(
            "region",
            "Region must not be empty",
            "Alue ei voi olla tyhjä",
        ));
    }
    let date = parse_query_date(&query.date)?;

    let observations = state.store.by_region_and_date(&query.region, date).await?;
    Ok(Json(observations))
}
