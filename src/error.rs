//! Error types for the fetch, config and export-filter layers
//! Orchestration code wraps these in anyhow with context

use std::path::PathBuf;

/// Failure to obtain a usable table from an upstream endpoint
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request to {url} failed: {status}")]
    Status { url: String, status: u16 },

    #[error("response is an error page rather than data: {0}")]
    ErrorPage(String),

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("expected at least 3 columns, got {0}")]
    TooFewColumns(usize),

    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to fetch data from StatCan ({url}): {source}")]
    Exhausted {
        url: String,
        source: Box<FetchError>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Rejected export filter arguments
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Unknown source '{name}'. Available: {available}")]
    UnknownSource { name: String, available: String },

    #[error("Unknown page '{name}'. Available: {available}")]
    UnknownPage { name: String, available: String },

    #[error("invalid vector pattern: {0}")]
    BadPattern(#[from] globset::Error),
}
