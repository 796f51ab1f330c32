//! Error types for SubTrak

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Aggregator answered, but not with a usable result (non-200 status or
    /// a business error code). Worth retrying later.
    #[error("Aggregator error: {0}")]
    Aggregator(String),

    #[error("Aggregator not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller may retry the operation that produced this error.
    ///
    /// Network and aggregator failures are transient; everything else
    /// (bad input, missing records, schema/constraint errors, missing
    /// credentials) will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Aggregator(_) | Self::Pool(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(Error::Aggregator("CF-12345".into()).is_retryable());
        assert!(!Error::InvalidData("bad".into()).is_retryable());
        assert!(!Error::NotFound("sub 1".into()).is_retryable());
        assert!(!Error::NotConfigured("missing client id".into()).is_retryable());
    }
}
