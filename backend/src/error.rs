//! Error handling for the Algae Bloom Risk Platform
//!
//! Provides consistent error responses in English and Finnish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Request errors
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fi: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Pipeline errors
    #[error("No source files matching {prefix}NN.csv in {directory}")]
    NoSourceFiles { directory: String, prefix: String },

    #[error("Insufficient historical data: {0}")]
    DataUnavailable(String),

    #[error("Training data error: {0}")]
    TrainingData(String),

    #[error("Model incompatible: {0}")]
    ModelIncompatible(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    // External service errors
    #[error("Weather archive unavailable: {0}")]
    WeatherUnavailable(String),

    #[error("Summarizer unavailable: {0}")]
    SummarizerUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // I/O and format errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation failure on a single request field
    pub fn validation(field: &str, message: impl Into<String>, message_fi: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_fi: message_fi.into(),
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidDate(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DataUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TrainingData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ModelNotLoaded
            | AppError::WeatherUnavailable(_)
            | AppError::SummarizerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NoSourceFiles { .. }
            | AppError::ModelIncompatible(_)
            | AppError::Configuration(_)
            | AppError::Io(_)
            | AppError::Csv(_)
            | AppError::Json(_)
            | AppError::Database(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::InvalidDate(raw) => ErrorDetail {
                code: "INVALID_DATE".to_string(),
                message_en: format!("Could not read date '{}'. Use D.M.YYYY or YYYY-MM-DD", raw),
                message_fi: format!(
                    "Päivämäärää '{}' ei voitu lukea. Käytä muotoa P.K.VVVV tai VVVV-KK-PP",
                    raw
                ),
                field: Some("date".to_string()),
            },
            AppError::Validation {
                field,
                message,
                message_fi,
            } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: message.clone(),
                message_fi: message_fi.clone(),
                field: Some(field.clone()),
            },
            AppError::NotFound(resource) => ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: format!("{} not found", resource),
                message_fi: format!("{} ei löytynyt", resource),
                field: None,
            },
            AppError::NoSourceFiles { directory, prefix } => ErrorDetail {
                code: "NO_SOURCE_FILES".to_string(),
                message_en: format!("No {}NN.csv files found in {}", prefix, directory),
                message_fi: format!("Hakemistosta {} ei löytynyt {}NN.csv-tiedostoja", directory, prefix),
                field: None,
            },
            AppError::DataUnavailable(msg) => ErrorDetail {
                code: "INSUFFICIENT_HISTORY".to_string(),
                message_en: format!("Not enough historical data: {}", msg),
                message_fi: format!("Historiatietoja ei ole riittävästi: {}", msg),
                field: None,
            },
            AppError::TrainingData(msg) => ErrorDetail {
                code: "TRAINING_DATA_ERROR".to_string(),
                message_en: msg.clone(),
                message_fi: format!("Opetusaineisto ei kelpaa: {}", msg),
                field: None,
            },
            AppError::ModelIncompatible(msg) => ErrorDetail {
                code: "MODEL_INCOMPATIBLE".to_string(),
                message_en: format!("Stored model does not match the feature layout: {}", msg),
                message_fi: "Tallennettu malli ei vastaa piirteitä. Opeta malli uudelleen".to_string(),
                field: None,
            },
            AppError::ModelNotLoaded => ErrorDetail {
                code: "MODEL_NOT_LOADED".to_string(),
                message_en: "No prediction model is loaded".to_string(),
                message_fi: "Ennustemallia ei ole ladattu".to_string(),
                field: None,
            },
            AppError::WeatherUnavailable(_) => ErrorDetail {
                code: "WEATHER_SERVICE_UNAVAILABLE".to_string(),
                message_en: "Weather archive is temporarily unavailable".to_string(),
                message_fi: "Sääarkisto ei ole tilapäisesti käytettävissä".to_string(),
                field: None,
            },
            AppError::SummarizerUnavailable(_) => ErrorDetail {
                code: "SUMMARIZER_UNAVAILABLE".to_string(),
                message_en: "Summary service is temporarily unavailable".to_string(),
                message_fi: "Yhteenvetopalvelu ei ole tilapäisesti käytettävissä".to_string(),
                field: None,
            },
            AppError::Configuration(msg) => ErrorDetail {
                code: "CONFIGURATION_ERROR".to_string(),
                message_en: format!("Configuration error: {}", msg),
                message_fi: format!("Asetusvirhe: {}", msg),
                field: None,
            },
            AppError::Io(_) | AppError::Csv(_) | AppError::Json(_) => ErrorDetail {
                code: "DATA_ACCESS_ERROR".to_string(),
                message_en: "Failed to read or write data files".to_string(),
                message_fi: "Datatiedostojen käsittely epäonnistui".to_string(),
                field: None,
            },
            AppError::Database(_) => ErrorDetail {
                code: "DATABASE_ERROR".to_string(),
                message_en: "A database error occurred".to_string(),
                message_fi: "Tietokantavirhe".to_string(),
                field: None,
            },
            AppError::Internal(msg) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: msg.clone(),
                message_fi: "Palvelimen sisäinen virhe".to_string(),
                field: None,
            },
            AppError::InternalError(_) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: "An internal server error occurred".to_string(),
                message_fi: "Palvelimen sisäinen virhe".to_string(),
                field: None,
            },
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_detail = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;
