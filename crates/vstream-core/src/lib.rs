//! Media transport and playback core for the vstream streaming stack.
//!
//! This crate holds everything that is shared between the server and client
//! pipelines and does not touch the network or any codec library directly:
//! the media datagram wire format, fragment reassembly, jitter buffering,
//! the audio-driven master clock, the decoded frame buffer, receive-side
//! network statistics, the adaptive bitrate ladder, and wall-clock pacing.

pub mod abr;
pub mod clock;
pub mod error;
pub mod frame;
pub mod frame_buffer;
pub mod jitter;
pub mod monitor;
pub mod pacer;
pub mod packet;
pub mod pcm;
pub mod reassembly;
pub mod trend;
pub mod wire;

pub use abr::{AbrController, AbrDecision, QualityLevel};
pub use clock::MasterClock;
pub use error::{CoreError, Result};
pub use frame::VideoFrame;
pub use frame_buffer::FrameBuffer;
pub use jitter::JitterBuffer;
pub use monitor::{NetworkMonitor, NetworkStats};
pub use pacer::Pacer;
pub use packet::{MediaKind, MediaPacket};
pub use reassembly::ReassemblyTable;
pub use trend::{ArrivalHistory, NetworkTrend};
pub use wire::{DatagramHeader, HEADER_SIZE, MAX_FRAGMENT_PAYLOAD};

/// Audio sample rate used across the stack (Hz).
pub const AUDIO_RATE: u32 = 16_000;

/// Samples per audio chunk.
pub const AUDIO_CHUNK_SAMPLES: usize = 256;

/// Audio channel count (mono).
pub const AUDIO_CHANNELS: usize = 1;
