//! Error types for airmerge.
//!
//! Uses `thiserror` for library-style error definitions. Collaborators use
//! these internally and absorb them at their public entry points.

use thiserror::Error;

/// Errors that can occur in airmerge operations.
#[derive(Error, Debug)]
pub enum AirError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Upstream API returned an error status
    #[error("{service} API error (HTTP {status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
        /// Seconds the upstream asked us to wait, if it said so
        retry_after: Option<u64>,
    },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Trend projection could not use its input
    #[error("Projection failed: {0}")]
    Projection(String),
}
