//! Error types shared across the agent.

use std::time::Duration;
use thiserror::Error;

/// One hardware category (or one drive / one GPU field) could not be read.
/// Recovered inside the sampler and surfaced as a sentinel.
#[derive(Debug, Clone, Error, PartialEq, Eq, Hash)]
pub enum CollectError {
    #[error("{0} monitoring not available")]
    Unavailable(&'static str),

    #[error("drive {0} not found")]
    DriveNotFound(String),

    #[error("gpu {index}: {message}")]
    Gpu { index: u32, message: String },

    #[error("{0}")]
    Other(String),
}

impl CollectError {
    pub fn other<S: Into<String>>(msg: S) -> Self {
        CollectError::Other(msg.into())
    }

    /// Variant name, stable across changing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::Unavailable(_) => "unavailable",
            CollectError::DriveNotFound(_) => "drive_not_found",
            CollectError::Gpu { .. } => "gpu",
            CollectError::Other(_) => "other",
        }
    }
}

/// The sampler as a whole failed; the broadcast loop backs off and retries.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("hardware collection exceeded {0:?}")]
    Timeout(Duration),

    #[error("hardware collection panicked: {0}")]
    Panicked(String),

    #[error("hardware worker failed: {0}")]
    Join(String),
}

/// A configuration update was rejected; the previous configuration stays in effect.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("malformed configuration update: {0}")]
    Malformed(String),

    #[error("refresh_rate must be between {min} and {max} seconds, got {value}")]
    RefreshRate { value: f64, min: f64, max: f64 },
}

/// Delivering one frame to one subscriber failed.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("channel closed")]
    Closed,

    #[error("push timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}
