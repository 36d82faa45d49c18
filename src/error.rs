//! Error types for manuscript-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Validation, CodeNotFound, DownloadUi, ApiRequest, ...)
//! - Conversions from the underlying HTTP, WebDriver, and I/O error types
//! - A retry classification helper used by the download orchestrator

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manuscript-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manuscript-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "challenge_endpoint")
        key: Option<String>,
    },

    /// Malformed challenge payload (non-array fields, wrong shapes)
    ///
    /// Fatal to the decode call it occurred in; decoding is deterministic,
    /// so this is never retried.
    #[error("invalid challenge: {0}")]
    Validation(String),

    /// All extraction strategies were exhausted without finding an access code
    #[error("access code not found in {} after trying all extraction strategies", .path.display())]
    CodeNotFound {
        /// Path of the downloaded file that was searched
        path: PathBuf,
    },

    /// The portal displayed its in-page download error banner
    ///
    /// Treated as a transient attempt failure, eligible for retry.
    #[error("download error reported by portal UI: {0}")]
    DownloadUi(String),

    /// The cipher-challenge API returned a non-2xx response
    #[error("challenge API request failed: {status} {status_text}")]
    ApiRequest {
        /// HTTP status code from the API response
        status: u16,
        /// Canonical status text (empty if the server sent none)
        status_text: String,
    },

    /// The download did not complete within the bounded wait
    #[error("download did not complete within {0:?}")]
    DownloadTimeout(std::time::Duration),

    /// Portal page was not in the expected state (missing element, wrong label)
    #[error("portal state error: {0}")]
    Portal(String),

    /// WebDriver command failed
    #[error("webdriver error: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    /// WebDriver session could not be established
    #[error("webdriver session error: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error counts as a transient per-attempt failure in the
    /// download loop.
    ///
    /// The orchestrator retries everything that can be caused by UI timing
    /// races, upstream rate-limiting, or flaky PDF generation. Deterministic
    /// failures (validation, configuration, API rejections) are permanent.
    pub fn is_attempt_failure(&self) -> bool {
        match self {
            Error::CodeNotFound { .. } => true,
            Error::DownloadUi(_) => true,
            Error::DownloadTimeout(_) => true,
            Error::Portal(_) => true,
            Error::WebDriver(_) => true,
            Error::Io(_) => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Config { .. }
            | Error::Validation(_)
            | Error::ApiRequest { .. }
            | Error::Session(_)
            | Error::Serialization(_) => false,
        }
    }
}
