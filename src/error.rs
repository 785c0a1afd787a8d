use std::time::Duration;

use thiserror::Error;

use crate::protocol::frame::FrameParseError;

/// Errors that can occur in the synchronization core
///
/// Only structurally invalid input and collaborator failures surface here.
/// Scheduling anomalies (late chunks, queue overflow, rejected clock samples)
/// are absorbed by policy and reported through statistics instead.
#[derive(Debug, Error)]
pub enum SyncError {
    // ===== Wire Errors =====
    /// Binary frame could not be decoded
    #[error("frame error: {0}")]
    Frame(#[from] FrameParseError),

    // ===== Collaborator Errors =====
    /// The external codec failed to decode a chunk
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure
        message: String,
    },

    /// A clock exchange with the server failed
    #[error("time exchange failed: {message}")]
    Exchange {
        /// Description of the failure
        message: String,
    },

    /// A clock exchange did not complete in time
    #[error("time exchange timed out after {duration:?}")]
    ExchangeTimeout {
        /// The configured timeout
        duration: Duration,
    },

    // ===== Configuration Errors =====
    /// A configuration value is out of range
    #[error("invalid config: {name} - {message}")]
    InvalidConfig {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },

    // ===== State Errors =====
    /// The scheduler has been finished and its output channel is closed
    #[error("scheduler finished")]
    Finished,
}

impl SyncError {
    /// Check if the caller can drop the offending item and carry on
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Frame(_) | Self::Codec { .. } | Self::Exchange { .. } | Self::ExchangeTimeout { .. }
        )
    }
}

/// Result type alias for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;
