//! Audio consumer task.
//!
//! Pulls PCM chunks from the audio jitter buffer, starts the master clock
//! with the first one, enforces the lateness policy, and substitutes
//! silence for losses once the clock runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use vstream_core::{pcm, JitterBuffer, MasterClock, AUDIO_CHUNK_SAMPLES, AUDIO_RATE};

use crate::media::AudioSink;
use crate::session::SessionFlags;

/// Packets older than this relative to the clock are dropped.
pub const LATE_DROP_MS: i64 = 80;

/// Duration of one silence chunk.
const CHUNK_DURATION: Duration =
    Duration::from_millis((AUDIO_CHUNK_SAMPLES as u64 * 1000) / AUDIO_RATE as u64);

/// What to do with an audio packet relative to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioAction {
    /// Too late to be useful.
    Drop,
    /// Early; wait this many ms first.
    PlayAfterMs(i64),
    /// Due now.
    Play,
}

/// Lateness policy: drop when more than [`LATE_DROP_MS`] behind, sleep out
/// any positive lead.
pub fn audio_action(pts_ms: i64, clock_now_ms: i64) -> AudioAction {
    let delta = pts_ms - clock_now_ms;
    if delta < -LATE_DROP_MS {
        AudioAction::Drop
    } else if delta > 0 {
        AudioAction::PlayAfterMs(delta)
    } else {
        AudioAction::Play
    }
}

/// Volume shared with the UI layer, stored as `f64` bits.
pub struct Volume(AtomicU64);

impl Volume {
    pub fn new(gain: f64) -> Self {
        Self(AtomicU64::new(gain.to_bits()))
    }

    pub fn set(&self, gain: f64) {
        self.0.store(gain.clamp(0.0, 2.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

pub struct AudioTask {
    pub buffer: Arc<JitterBuffer>,
    pub clock: Arc<MasterClock>,
    pub sink: Arc<dyn AudioSink>,
    pub volume: Arc<Volume>,
    pub flags: Arc<SessionFlags>,
    pub late_drops: Arc<AtomicU64>,
}

impl AudioTask {
    pub async fn run(self) {
        let silence = vec![0i16; AUDIO_CHUNK_SAMPLES];
        debug!("audio task started");

        while self.flags.is_running() {
            if self.clock.is_paused() {
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }

            match self.buffer.pop() {
                Some(packet) => {
                    // The first played packet anchors the session clock.
                    self.clock.start(packet.ts);

                    match audio_action(packet.ts, self.clock.now_ms()) {
                        AudioAction::Drop => {
                            self.late_drops.fetch_add(1, Ordering::Relaxed);
                            trace!(pts = packet.ts, "late audio dropped");
                            continue;
                        }
                        AudioAction::PlayAfterMs(delta) => {
                            tokio::time::sleep(Duration::from_millis(delta as u64)).await;
                        }
                        AudioAction::Play => {}
                    }

                    let mut samples = match pcm::unpack(&packet.payload) {
                        Ok(samples) => samples,
                        Err(e) => {
                            debug!(error = %e, "bad audio payload dropped");
                            continue;
                        }
                    };
                    pcm::apply_gain(&mut samples, self.volume.get());
                    if let Err(e) = self.sink.write(&samples) {
                        debug!(error = %e, "audio sink write failed");
                    }
                }
                None => {
                    if self.clock.is_started() {
                        // A gap in the stream: keep the device fed.
                        if let Err(e) = self.sink.write(&silence) {
                            debug!(error = %e, "audio sink write failed");
                        }
                        tokio::time::sleep(CHUNK_DURATION).await;
                    } else {
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    }
                }
            }
        }
        debug!("audio task finished");
    }
}
