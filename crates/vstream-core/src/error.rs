//! Error types for the media core.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced by the transport/playback core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Datagram too short or header fields inconsistent
    #[error("malformed datagram: {details}")]
    Malformed { details: String },

    /// Fragment does not fit the frame it claims to belong to
    #[error("fragment mismatch for pts {pts}: {details}")]
    FragmentMismatch { pts: i64, details: String },

    /// Buffer is at capacity and refused the element
    #[error("buffer full: capacity {capacity}")]
    BufferFull { capacity: usize },

    /// Frame data does not describe a valid picture
    #[error("invalid frame: {details}")]
    InvalidFrame { details: String },

    /// Operation is meaningless in the current state
    #[error("invalid state: {details}")]
    InvalidState { details: String },
}

impl CoreError {
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::Malformed {
            details: details.into(),
        }
    }

    pub fn invalid_frame(details: impl Into<String>) -> Self {
        Self::InvalidFrame {
            details: details.into(),
        }
    }

    pub fn invalid_state(details: impl Into<String>) -> Self {
        Self::InvalidState {
            details: details.into(),
        }
    }
}
