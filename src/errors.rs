//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the wiki extraction engine, providing one
//! error enum for every component plus the transient/fatal split the rest of
//! the crate relies on.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from HTTP transport, JSON decoding, the
//!   remote wiki API, and configuration loading
//! - **Output**: Structured error values with context, plus helpers for
//!   recovery decisions and logging categories
//!
//! ## Key Features
//! - Transient errors (transport failures, anti-bot challenge pages,
//!   unexpected response shapes) are recovered locally as empty results
//! - API-reported errors and invalid queries propagate to the caller
//! - Automatic conversion from common library error types

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, WikiError>;

/// Error types for the wiki extraction engine
#[derive(Debug, Error)]
pub enum WikiError {
    /// Network-level failure (connect, timeout, non-2xx status)
    #[error("network error: {details}")]
    Network { details: String },

    /// The wiki API returned an `error` object in a 200 response.
    /// This indicates a malformed request, not a transient condition.
    #[error("wiki API error '{code}': {info}")]
    Api { code: String, info: String },

    /// The response body did not have the expected JSON shape
    #[error("unexpected response shape from {endpoint}: {details}")]
    ResponseShape { endpoint: String, details: String },

    /// An HTML page came back where JSON was expected (anti-bot challenge)
    #[error("anti-bot challenge page returned instead of JSON")]
    BotChallenge,

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The caller's query was rejected before any request was issued
    #[error("invalid search query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WikiError {
    /// Check if the error is transient: one failed sub-fetch must not abort
    /// an otherwise-successful crawl or batch, so these are recovered as
    /// empty results at the component boundary.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WikiError::Network { .. }
                | WikiError::BotChallenge
                | WikiError::ResponseShape { .. }
                | WikiError::Http(_)
                | WikiError::Json(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            WikiError::Network { .. } | WikiError::Http(_) | WikiError::BotChallenge => "transport",
            WikiError::Api { .. } => "api",
            WikiError::ResponseShape { .. } | WikiError::Json(_) => "shape",
            WikiError::Config { .. } | WikiError::Toml(_) | WikiError::Io(_) => "config",
            WikiError::InvalidQuery { .. } => "query",
        }
    }
}

/// Recover a transient failure as the default (empty) value, logging it, so
/// the caller sees absence of data instead of an exception. Fatal errors
/// (API-reported, invalid query, configuration) still propagate.
pub(crate) fn recover_transient<T: Default>(result: Result<T>, context: &str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_transient() => {
            tracing::warn!("{} failed ({}): {}; treating as empty", context, err.category(), err);
            Ok(T::default())
        }
        Err(err) => Err(err),
    }
}
