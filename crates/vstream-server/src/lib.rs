//! vstream streaming server.
//!
//! Owns the file/camera sources behind trait seams, the transcode-and-send
//! pipeline, the per-connection ABR controller, and the control-stream
//! dispatch. The binary in `main.rs` wires a QUIC endpoint to one
//! [`manager::StreamManager`] per connection.

pub mod catalog;
pub mod config;
pub mod control;
pub mod error;
pub mod manager;
pub mod media;
pub mod pipeline;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
