//! Periodic playback statistics.
//!
//! Once a second, snapshot the network monitor and the frame counters and
//! log them. The latency cell is fed by heartbeat replies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::session::PlaySession;

/// Latest one-way latency estimate shared between the control loop and the
/// stats task, stored as `f64` bits.
#[derive(Default)]
pub struct LatencyCell(AtomicU64);

impl LatencyCell {
    pub fn set(&self, latency_ms: f64) {
        self.0.store(latency_ms.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

pub async fn run(session: Arc<PlaySession>, latency: Arc<LatencyCell>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last_decoded = 0u64;
    let mut last_rendered = 0u64;

    while session.is_running() {
        ticker.tick().await;

        let stats = session.monitor.snapshot();
        let decoded = session.counters.decoded_frames.load(Ordering::Relaxed);
        let rendered = session.counters.rendered_frames.load(Ordering::Relaxed);
        let decoded_fps = decoded - last_decoded;
        let rendered_fps = rendered - last_rendered;
        last_decoded = decoded;
        last_rendered = rendered;

        info!(
            loss_pct = stats.loss_rate * 100.0,
            kbps = (stats.bitrate_bps / 1024.0) as u64,
            decoded_fps,
            rendered_fps,
            latency_ms = latency.get(),
            buffered_ms = session.frames.duration_ms(),
            "playback stats"
        );
    }
}
