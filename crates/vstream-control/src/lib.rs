//! Control-stream protocol for vstream.
//!
//! One reliable bidirectional QUIC stream per connection carries compact
//! JSON objects, one per application message. This crate defines the
//! message types, an incremental reader that recovers message boundaries
//! from the byte stream, and the heartbeat latency estimate.

pub mod error;
pub mod framing;
pub mod messages;

pub use error::{ControlError, Result};
pub use framing::MessageReader;
pub use messages::{ClientCommand, ServerMessage, Trend};

/// One-way latency estimate from an echoed heartbeat timestamp, both in
/// epoch milliseconds.
pub fn one_way_latency_ms(now_ms: i64, echoed_client_ts_ms: i64) -> f64 {
    (now_ms - echoed_client_ts_ms) as f64 / 2.0
}

/// Milliseconds since the Unix epoch, as carried in heartbeats.
pub fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_way_latency_halves_round_trip() {
        assert_eq!(one_way_latency_ms(1_000_040, 1_000_000), 20.0);
    }
}
