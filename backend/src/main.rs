//! Algae Bloom Risk Platform - Backend Server
//!
//! Serves severity predictions, observation queries, hotspot maps and
//! narrative summaries for Finnish lake and sea observation stations.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use algae_bloom_backend::{
    create_app,
    error::AppError,
    external::{GeminiSummarizer, Summarizer},
    services::{
        corpus::read_corpus, hotspot, MemoryObservationStore, ObservationStore,
        PgObservationStore, PredictionService, SummaryService,
    },
    AppState, Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bloom_server=debug,algae_bloom_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Algae Bloom Risk Server");
    tracing::info!("Environment: {}", config.environment);

    let store = open_store(&config).await?;

    // A missing model is not fatal; the prediction endpoint answers 503
    let predictor = match PredictionService::load(&config) {
        Ok(service) => Some(Arc::new(service)),
        Err(e @ AppError::ModelIncompatible(_)) => return Err(e.into()),
        Err(e) => {
            tracing::warn!("Prediction model not loaded: {}", e);
            None
        }
    };

    let summarizer: Option<Arc<dyn Summarizer>> = match GeminiSummarizer::from_config(&config.summarizer)? {
        Some(client) => Some(Arc::new(client)),
        None => {
            tracing::warn!("No summarizer API key configured; summaries are disabled");
            None
        }
    };

    let hotspots = hotspot::build_report(store.as_ref()).await?;

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        predictor,
        summaries: SummaryService::new(store.clone(), summarizer),
        store,
        hotspots: Arc::new(hotspots),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let ip: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((ip, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// PostgreSQL when a database URL is configured, otherwise the enriched corpus in memory
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ObservationStore>> {
    if let Some(url) = &config.database.url {
        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;

        tracing::info!("Database connection established");

        // Run migrations in development
        if config.environment == "development" {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");
        }

        return Ok(Arc::new(PgObservationStore::new(db_pool)));
    }

    let observations = match read_corpus(&config.enriched_corpus_path) {
        Ok(corpus) => corpus.into_iter().map(|r| r.observation).collect(),
        Err(e) => {
            tracing::warn!(
                "No database configured and corpus {} unreadable: {}",
                config.enriched_corpus_path.display(),
                e
            );
            Vec::new()
        }
    };
    tracing::info!("Using in-memory store with {} observations", observations.len());

    Ok(Arc::new(MemoryObservationStore::new(observations)))
}
