//! Error types for the control protocol.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Error, Debug)]
pub enum ControlError {
    /// The stream carried bytes that are not a valid JSON message
    #[error("malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A single message exceeded the reader's buffer limit
    #[error("control message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },
}
