//! vstream streaming client.
//!
//! Receives media datagrams, reassembles and buffers them, decodes video
//! through a pluggable codec seam, and drives playback off the
//! audio-anchored master clock. Rendering and audio output are collaborator
//! seams; the binary wires null sinks and logs statistics.

pub mod audio;
pub mod config;
pub mod error;
pub mod media;
pub mod render;
pub mod session;
pub mod stats;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::PlaySession;
