//! QUIC transport adapter for vstream.
//!
//! Wraps `quinn` endpoints behind the shapes the rest of the stack wants:
//! unreliable datagrams for media, one bidirectional stream per connection
//! for control, events surfaced over channels instead of callbacks. ALPN is
//! `"vstream"`, congestion control is BBR, idle timeout 10 s.

pub mod cert;
pub mod client;
pub mod error;
pub mod server;
pub mod settings;

pub use cert::ServerIdentity;
pub use client::ClientTransport;
pub use error::{Result, TransportError};
pub use server::{ServerTransport, TransportConnection};
pub use settings::TransportSettings;

/// ALPN protocol identifier for all vstream connections.
pub const ALPN: &[u8] = b"vstream";

/// Events surfaced by a connection to its consumer.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Bytes arrived on the control stream (unframed).
    Control(bytes::Bytes),
    /// A media datagram arrived.
    Datagram(bytes::Bytes),
    /// The connection is gone; no further events follow.
    Closed { reason: String },
}
