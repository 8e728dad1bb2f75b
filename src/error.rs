//! Error types for sharelink
//!
//! Two layers of failure exist in this crate:
//! - [`Error`] covers infrastructure problems (configuration, HTTP client setup,
//!   URL construction, local filesystem writes).
//! - [`ClassifiedError`](crate::classifier::ClassifiedError) covers everything the
//!   delivery endpoints report back and is the only failure type the access flow
//!   hands to a UI.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sharelink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sharelink infrastructure
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api_base_url")
        key: Option<String>,
    },

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Endpoint URL could not be built from the configured base
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Download target could not be written
    #[error("failed to save {file_name} into {dir}: {reason}")]
    SaveFailed {
        /// The file name that was requested
        file_name: String,
        /// Directory the sink writes into
        dir: PathBuf,
        /// The reason the save failed
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
