use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source '{source_name}' unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    #[error("Source '{source_name}' timed out after {timeout:?}")]
    Timeout { source_name: String, timeout: Duration },

    #[error("Malformed record at index {index} from '{source_name}': {reason}")]
    MalformedRecord {
        source_name: String,
        index: usize,
        reason: String,
    },

    #[error("Cache entry '{key}' is corrupt: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("No source returned any plans")]
    EmptyResult,
}

impl AggregatorError {
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
