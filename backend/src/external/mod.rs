//! External API integrations

pub mod summarizer;
pub mod weather;

pub use summarizer::{GeminiSummarizer, Summarizer, SummaryKind};
pub use weather::{OpenMeteoArchiveClient, WeatherSource};
