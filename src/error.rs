//! Custom error types for rustpubmed.
//!
//! All library functions return `Result<T, PubmedError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustpubmed operations.
#[derive(Debug, Error)]
pub enum PubmedError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// PubMed answered with a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Status line
        message: String,
    },

    /// HTML or record parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Paper store or term list CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `PubmedError`
pub type Result<T> = std::result::Result<T, PubmedError>;
