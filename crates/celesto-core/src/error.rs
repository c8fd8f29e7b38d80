//! Error types for the Celesto SDK.
//!
//! Every remote failure is classified into exactly one variant by the
//! response classifier; callers decide retry policy from the variant kind
//! (and [`CelestoError::retry_after`]) instead of parsing message text.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Result type alias for Celesto operations.
pub type CelestoResult<T> = Result<T, CelestoError>;

/// Main error type for Celesto operations.
#[derive(Error, Debug)]
pub enum CelestoError {
    /// The API key was rejected (HTTP 401/403).
    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// A named resource does not exist. `status` is present for HTTP 404
    /// responses and absent when project resolution exhausts the listing.
    #[error("not found: {message}")]
    NotFound { status: Option<u16>, message: String },

    /// The server rejected the request payload (HTTP 400/422).
    #[error("validation failed (HTTP {status}): {message}")]
    Validation { status: u16, message: String },

    /// The server asked us to slow down (HTTP 429).
    #[error("rate limited (HTTP {status}), retry after {}s: {message}", retry_after.as_secs())]
    RateLimit {
        status: u16,
        message: String,
        retry_after: Duration,
    },

    /// A 5xx response, or any status outside the classified set.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response (connect failure, timeout,
    /// cancelled in flight).
    #[error("network error: {message}")]
    Network { message: String },

    /// A local filesystem failure while walking or archiving. Always fatal
    /// to the deployment in progress.
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing or contradictory local configuration (no API key, bad base
    /// URL, nonexistent agent folder).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CelestoError {
    /// Build an [`CelestoError::Io`] for a failure at `path`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// The delay the server asked for, when this error is retryable on a
    /// schedule. Only `RateLimit` carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
