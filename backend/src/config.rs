//! Configuration management for the Algae Bloom Risk Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with BLOOM__ prefix

use std::path::PathBuf;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Directory holding the raw `HavaintoNN.csv` survey exports
    pub data_directory: PathBuf,

    /// File name prefix of the survey exports (matched case-insensitively)
    pub file_prefix: String,

    /// Trained classifier artifact
    pub model_path: PathBuf,

    /// Weather-enriched training corpus
    pub enriched_corpus_path: PathBuf,

    /// Per-day weather behind each enriched row, for auditing
    pub daily_weather_path: PathBuf,

    /// Length of the trailing weather window in days
    pub weather_window_days: u32,

    /// Number of nearby stations averaged for month-typical weather
    pub nearest_neighbor_k: usize,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Weather archive configuration
    pub weather: WeatherConfig,

    /// Classifier training configuration
    pub training: TrainingConfig,

    /// Narrative summary configuration
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Observations are served from memory when unset.
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    /// Historical weather archive endpoint
    pub archive_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Pause between consecutive archive requests in milliseconds
    pub request_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    /// Seed for the stratified split
    pub seed: u64,

    /// Boosting rounds
    pub n_estimators: usize,

    /// Shrinkage applied to every tree
    pub learning_rate: f64,

    /// Maximum tree depth
    pub max_depth: usize,

    /// Minimum hessian sum in a leaf
    pub min_child_weight: f64,

    /// L2 regularization on leaf weights
    pub lambda: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    /// Text generation endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// API key. Summaries are reported as unavailable when unset.
    pub api_key: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("BLOOM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::builder_with_defaults(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BLOOM__ prefix)
            .add_source(
                Environment::with_prefix("BLOOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration made of defaults only, ignoring files and environment
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder_with_defaults("development")?
            .build()?
            .try_deserialize()
    }

    fn builder_with_defaults(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("data_directory", "data")?
            .set_default("file_prefix", "Havainto")?
            .set_default("model_path", "data/severity_model.json")?
            .set_default("enriched_corpus_path", "data/enriched_observations.csv")?
            .set_default("daily_weather_path", "data/daily_weather_audit.csv")?
            .set_default("weather_window_days", 7)?
            .set_default("nearest_neighbor_k", 5)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("weather.archive_url", "https://archive-api.open-meteo.com/v1/archive")?
            .set_default("weather.timeout_secs", 20)?
            .set_default("weather.request_delay_ms", 100)?
            .set_default("training.seed", 42)?
            .set_default("training.n_estimators", 500)?
            .set_default("training.learning_rate", 0.05)?
            .set_default("training.max_depth", 6)?
            .set_default("training.min_child_weight", 1.0)?
            .set_default("training.lambda", 1.0)?
            .set_default(
                "summarizer.endpoint",
                "https://generativelanguage.googleapis.com/v1beta/models",
            )?
            .set_default("summarizer.model", "gemini-2.5-flash")?
            .set_default("summarizer.temperature", 0.2)?
            .set_default("summarizer.timeout_secs", 60)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.weather_window_days, 7);
        assert_eq!(config.nearest_neighbor_k, 5);
        assert_eq!(config.weather.timeout_secs, 20);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.n_estimators, 500);
        assert!(config.database.url.is_none());
        assert!(config.summarizer.api_key.is_none());
        assert_eq!(config.file_prefix, "Havainto");
    }
}
