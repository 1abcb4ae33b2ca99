//! Route definitions for the Algae Bloom Risk Platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Severity model
        .route("/predictions", post(handlers::predict))
        // Raw observations
        .route("/observations", get(handlers::list_by_region_and_date))
        // Recurring bloom stations
        .nest("/hotspots", hotspot_routes())
        // Narrative summaries
        .nest("/summaries", summary_routes())
}

fn hotspot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_hotspots))
        .route("/nearest", get(handlers::nearest_station))
}

fn summary_routes() -> Router<AppState> {
    Router::new()
        .route("/weekly", get(handlers::weekly_bulletin))
        .route("/local", get(handlers::local_analysis))
}
