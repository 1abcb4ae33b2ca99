//! `bloom-pipeline` binary: offline steps of the algae bloom pipeline.
//!
//! # Usage
//!
//! ```bash
//! bloom-pipeline enrich            # ingest exports and attach weather
//! bloom-pipeline train             # fit the severity classifier
//! bloom-pipeline import            # load exports into PostgreSQL
//! bloom-pipeline hotspots --output data/hotspots.csv
//! ```

use std::{path::PathBuf, time::Duration};

use algae_bloom_backend::{
    external::OpenMeteoArchiveClient,
    services::{
        corpus::{read_corpus, write_corpus, write_daily_audit},
        hotspot, MemoryObservationStore, ObservationStore, PgObservationStore, RecordIngestor,
        SeverityClassifier, WeatherEnricher,
    },
    Config,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the pipeline binary.
#[derive(Parser, Debug)]
#[command(
    name = "bloom-pipeline",
    version,
    about = "Algae bloom ingestion, enrichment and training pipeline",
    long_about = None
)]
struct Args {
    /// Override the directory holding the survey exports.
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Override the model artifact path.
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,

    /// Override the enriched corpus path.
    #[arg(long, value_name = "FILE", global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest survey exports and attach trailing weather windows
    Enrich {
        /// Refetch weather even when an enriched corpus already exists
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Train the severity classifier on the enriched corpus
    Train,
    /// Ingest survey exports into the configured database
    Import,
    /// Score stations by bloom recurrence
    Hotspots {
        /// Write the full report as CSV
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Rows printed to the log
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bloom_pipeline=info,algae_bloom_backend=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    dotenvy::dotenv().ok();
    let mut config = Config::load().context("failed to load configuration")?;

    // Apply CLI overrides.
    if let Some(dir) = args.data_dir {
        config.data_directory = dir;
    }
    if let Some(path) = args.model {
        config.model_path = path;
    }
    if let Some(path) = args.corpus {
        config.enriched_corpus_path = path;
    }

    match args.command {
        Command::Enrich { force } => enrich(&config, force).await,
        Command::Train => train(&config),
        Command::Import => import(&config).await,
        Command::Hotspots { output, top } => hotspots(&config, output, top).await,
    }
}

async fn enrich(config: &Config, force: bool) -> anyhow::Result<()> {
    if !force && config.enriched_corpus_path.exists() {
        let corpus = read_corpus(&config.enriched_corpus_path)?;
        let enriched = corpus.iter().filter(|r| r.is_enriched()).count();
        info!(
            "Reusing {} ({} rows, {} with weather); pass --force to refetch",
            config.enriched_corpus_path.display(),
            corpus.len(),
            enriched
        );
        return Ok(());
    }

    let report = RecordIngestor::from_config(config).ingest()?;
    info!(
        "Ingested {} rows from {} files ({} rows dropped, {} files skipped)",
        report.records.len(),
        report.files_read.len(),
        report.rows_dropped,
        report.files_skipped.len()
    );

    let client = OpenMeteoArchiveClient::new(&config.weather)?;
    let enricher = WeatherEnricher::new(
        &client,
        config.weather_window_days,
        Duration::from_millis(config.weather.request_delay_ms),
    );
    let outcome = enricher.enrich_all(report.records).await;
    if outcome.failed > 0 {
        warn!("{} observations kept without weather", outcome.failed);
    }

    write_corpus(&config.enriched_corpus_path, &outcome.records)?;
    let audit_rows = write_daily_audit(&config.daily_weather_path, &outcome.records)?;

    info!(
        "Wrote {} and {} daily rows to {}",
        config.enriched_corpus_path.display(),
        audit_rows,
        config.daily_weather_path.display()
    );
    Ok(())
}

fn train(config: &Config) -> anyhow::Result<()> {
    let corpus = read_corpus(&config.enriched_corpus_path).with_context(|| {
        format!(
            "cannot read {}; run `bloom-pipeline enrich` first",
            config.enriched_corpus_path.display()
        )
    })?;

    let classifier = SeverityClassifier::train(&corpus, &config.training)?;
    let metrics = classifier.metrics();

    info!(
        "Split: {} train / {} validation / {} test rows",
        metrics.train_rows, metrics.validation_rows, metrics.test_rows
    );
    info!("  class counts       : {:?}", metrics.class_counts);
    if let Some(acc) = metrics.validation_accuracy {
        info!("  validation accuracy: {:.3}", acc);
    }
    if let Some(acc) = metrics.test_accuracy {
        info!("  test accuracy      : {:.3}", acc);
    }

    classifier.save(&config.model_path)?;
    info!("Model written to {}", config.model_path.display());
    Ok(())
}

async fn import(config: &Config) -> anyhow::Result<()> {
    let Some(url) = &config.database.url else {
        bail!("database.url is not configured; set BLOOM__DATABASE__URL");
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let report = RecordIngestor::from_config(config).ingest()?;
    let store = PgObservationStore::new(pool);
    let stored = store.insert_many(&report.records).await?;

    info!("Imported {} observations", stored);
    Ok(())
}

async fn hotspots(config: &Config, output: Option<PathBuf>, top: usize) -> anyhow::Result<()> {
    let report = RecordIngestor::from_config(config).ingest()?;
    let store = MemoryObservationStore::new(report.records);
    let report = hotspot::build_report(&store).await?;

    for station in report.stations.iter().take(top) {
        info!(
            "{:<50} risk {:>3}  problem years {:>2}  latest {}{}",
            station.station,
            station.risk_number,
            station.problem_years,
            station.latest_year_max,
            if station.is_hotspot { "  HOTSPOT" } else { "" }
        );
    }

    if let Some(path) = output {
        hotspot::write_csv(&path, &report)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}
