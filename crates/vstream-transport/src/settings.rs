//! quinn transport configuration shared by server and client.

use std::sync::Arc;
use std::time::Duration;

use quinn::congestion::BbrConfig;
use quinn::{IdleTimeout, TransportConfig, VarInt};

use crate::error::{Result, TransportError};

/// Connection idle timeout.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Initial congestion window, in packets, when pacing is disabled.
const UNPACED_INITIAL_WINDOW_PACKETS: u64 = 100;

/// Knobs the application layer can set.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    /// When false, the sender starts with a large initial congestion
    /// window instead of ramping up (loopback/lab profile).
    pub pacing_enabled: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            pacing_enabled: true,
        }
    }
}

impl TransportSettings {
    /// Build the quinn transport config: BBR, datagrams on, 10 s idle.
    pub fn build(&self) -> Result<TransportConfig> {
        let mut transport = TransportConfig::default();
        transport.max_idle_timeout(Some(
            IdleTimeout::try_from(IDLE_TIMEOUT)
                .map_err(|_| TransportError::setup("idle timeout out of range"))?,
        ));
        transport.datagram_receive_buffer_size(Some(2 * 1024 * 1024));
        transport.datagram_send_buffer_size(2 * 1024 * 1024);
        // Control traffic is one bidirectional stream per connection.
        transport.max_concurrent_bidi_streams(VarInt::from_u32(1));
        transport.max_concurrent_uni_streams(VarInt::from_u32(0));

        let mut bbr = BbrConfig::default();
        if !self.pacing_enabled {
            bbr.initial_window(UNPACED_INITIAL_WINDOW_PACKETS * 1200);
        }
        transport.congestion_controller_factory(Arc::new(bbr));
        Ok(transport)
    }
}
