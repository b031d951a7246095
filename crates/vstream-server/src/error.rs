//! Server error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration missing or invalid, fatal at startup
    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    /// Requested source does not exist
    #[error("unknown source: {name}")]
    UnknownSource { name: String },

    /// Source cannot deliver frames
    #[error("source failed: {reason}")]
    Source { reason: String },

    /// Encoder could not be created or refused a frame
    #[error("codec error: {reason}")]
    Codec { reason: String },

    /// Operation not available for this source kind
    #[error("{reason}")]
    Unsupported { reason: String },

    #[error(transparent)]
    Core(#[from] vstream_core::CoreError),

    #[error(transparent)]
    Transport(#[from] vstream_transport::TransportError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }

    pub fn source(reason: impl Into<String>) -> Self {
        Self::Source {
            reason: reason.into(),
        }
    }

    pub fn codec(reason: impl Into<String>) -> Self {
        Self::Codec {
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }
}
