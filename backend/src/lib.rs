//! Algae Bloom Risk Platform - backend library
//!
//! Ingestion, weather enrichment, model training and the HTTP API that
//! serves predictions, hotspot maps and summaries. Both binaries are thin
//! wrappers over this crate.

use std::sync::Arc;

use axum::{routing::get, Router};
use shared::HotspotReport;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{ObservationStore, PredictionService, SummaryService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` until a model has been trained
    pub predictor: Option<Arc<PredictionService>>,
    pub store: Arc<dyn ObservationStore>,
    pub summaries: SummaryService,
    /// Built once at startup from the store
    pub hotspots: Arc<HotspotReport>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Algae Bloom Risk Platform API v1"
}
