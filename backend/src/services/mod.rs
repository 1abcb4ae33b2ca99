//! Pipeline and query services for the Algae Bloom Risk Platform

pub mod boosting;
pub mod classifier;
pub mod corpus;
pub mod enrichment;
pub mod features;
pub mod historical;
pub mod hotspot;
pub mod ingest;
pub mod observations;
pub mod prediction;
pub mod summary;

pub use classifier::SeverityClassifier;
pub use enrichment::{EnrichmentOutcome, WeatherEnricher};
pub use features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use historical::HistoricalAverager;
pub use ingest::{IngestReport, RecordIngestor};
pub use observations::{MemoryObservationStore, ObservationStore, PgObservationStore};
pub use prediction::PredictionService;
pub use summary::SummaryService;
