//! Client error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration missing or invalid, fatal at startup
    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    /// Decoder refused a packet or produced no frame
    #[error("decode failed: {reason}")]
    Decode { reason: String },

    /// Audio or display sink failure
    #[error("sink failed: {reason}")]
    Sink { reason: String },

    #[error(transparent)]
    Core(#[from] vstream_core::CoreError),

    #[error(transparent)]
    Control(#[from] vstream_control::ControlError),

    #[error(transparent)]
    Transport(#[from] vstream_transport::TransportError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn sink(reason: impl Into<String>) -> Self {
        Self::Sink {
            reason: reason.into(),
        }
    }
}
