//! Transport error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Endpoint could not be created or bound
    #[error("endpoint setup failed: {reason}")]
    Setup { reason: String },

    /// Certificate or key problem, including fingerprint mismatch
    #[error("certificate error: {reason}")]
    Certificate { reason: String },

    /// Connection could not be established
    #[error("connect failed: {reason}")]
    Connect { reason: String },

    /// The peer went away or the connection was lost
    #[error("connection closed: {reason}")]
    Closed { reason: String },

    /// A datagram could not be sent
    #[error("datagram send failed: {reason}")]
    Datagram { reason: String },

    /// Control stream I/O failed
    #[error("control stream error: {reason}")]
    Stream { reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
        }
    }

    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::Certificate {
            reason: reason.into(),
        }
    }

    pub fn connect(reason: impl Into<String>) -> Self {
        Self::Connect {
            reason: reason.into(),
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }
}
