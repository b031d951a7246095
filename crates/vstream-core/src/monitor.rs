//! Receive-side network statistics.

use std::sync::Mutex;
use std::time::Instant;

/// Snapshot of the window since the previous [`NetworkMonitor::snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkStats {
    /// Lost / (received + lost) over the window, `0.0..=1.0`.
    pub loss_rate: f64,
    /// Received payload bits per second over the window.
    pub bitrate_bps: f64,
}

/// Rolling loss and bitrate counters over a 16-bit sequence space.
///
/// Sequence numbers wrap; a forward gap below half the space is counted as
/// loss, anything else is a late or duplicated packet and leaves the loss
/// counter alone.
pub struct NetworkMonitor {
    inner: Mutex<Inner>,
}

struct Inner {
    received_packets: u64,
    lost_packets: u64,
    expected_seq: Option<u16>,
    total_bytes: u64,
    window_start: Instant,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                received_packets: 0,
                lost_packets: 0,
                expected_seq: None,
                total_bytes: 0,
                window_start: Instant::now(),
            }),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.received_packets = 0;
        inner.lost_packets = 0;
        inner.expected_seq = None;
        inner.total_bytes = 0;
        inner.window_start = Instant::now();
    }

    /// Record an arrived packet of `size` payload bytes.
    ///
    /// The first packet after a reset only seeds the sequence tracker: it
    /// cannot witness loss either way, so it stays out of the loss
    /// denominator. Its bytes still count toward the bitrate.
    pub fn record(&self, seq: u16, size: usize) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(expected) = inner.expected_seq {
            let gap = seq.wrapping_sub(expected);
            if gap > 0 && gap < u16::MAX / 2 {
                inner.lost_packets += gap as u64;
            }
            inner.received_packets += 1;
        }
        inner.expected_seq = Some(seq.wrapping_add(1));
        inner.total_bytes += size as u64;
    }

    /// Compute the window statistics and reset the counters.
    pub fn snapshot(&self) -> NetworkStats {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> NetworkStats {
        let mut inner = self.inner.lock().unwrap();
        let mut stats = NetworkStats::default();

        let total = inner.received_packets + inner.lost_packets;
        if total > 0 {
            stats.loss_rate = inner.lost_packets as f64 / total as f64;
        }
        let elapsed = now.duration_since(inner.window_start).as_secs_f64();
        if elapsed > 0.0 {
            stats.bitrate_bps = (inner.total_bytes * 8) as f64 / elapsed;
        }

        inner.received_packets = 0;
        inner.lost_packets = 0;
        inner.total_bytes = 0;
        inner.window_start = now;
        stats
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
