//! Probe-level errors

use std::time::Duration;
use thiserror::Error;

/// Why a single probe attempt failed
#[derive(Error, Debug)]
pub enum HealthError {
    /// No answer within the per-attempt timeout
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established
    #[error("tcp connection failed: {0}")]
    Tcp(#[from] std::io::Error),

    /// Request failed at the HTTP layer
    #[error("http request failed: {0}")]
    Http(#[from] hyper::Error),

    /// Probe target is not a usable URL
    #[error("invalid probe url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Server answered with a status outside the accepted set
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),
}
