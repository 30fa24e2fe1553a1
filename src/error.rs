use std::path::PathBuf;

use thiserror::Error;

/// Startup-time failures. Any of these aborts the process before it serves.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("blackspot table is empty")]
    EmptyBlackspotTable,

    #[error("malformed table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid blackspot {name:?}: ({lat}, {lon}) is not a valid coordinate")]
    InvalidBlackspot { name: String, lat: f64, lon: f64 },
}

/// Failures while loading the classifier artifact. The server keeps running
/// without a model when one of these occurs.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found at {0}")]
    Missing(PathBuf),

    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported objective {0:?}, expected binary:logistic")]
    Objective(String),

    #[error("model trained on label rule v{found}, this build labels with v{expected}")]
    LabelRuleMismatch { found: String, expected: u32 },

    #[error("invalid tree {tree}: {reason}")]
    InvalidTree { tree: usize, reason: String },

    #[error("invalid base_score {0:?}")]
    BaseScore(String),
}

/// Per-request failures surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("risk model unavailable")]
    ModelUnavailable,

    #[error("coordinate out of range: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// Live context provider failures. Always absorbed by the fallback context.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider timed out")]
    Timeout,

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}
