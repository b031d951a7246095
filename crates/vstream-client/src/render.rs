//! Renderer task.
//!
//! Ticks at ~120 Hz, asks the decoded frame buffer for the best frame at
//! the clock's media time, falls back to linear interpolation between the
//! neighbouring frames, and hands the result to the display sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use vstream_core::{FrameBuffer, MasterClock};

use crate::media::{DisplaySink, FrameInterpolator};
use crate::session::SessionFlags;

/// Render tick, ~120 Hz.
pub const RENDER_TICK: Duration = Duration::from_millis(8);

pub struct RenderTask {
    pub frames: Arc<FrameBuffer>,
    pub clock: Arc<MasterClock>,
    pub display: Arc<dyn DisplaySink>,
    pub interpolator: Arc<dyn FrameInterpolator>,
    pub flags: Arc<SessionFlags>,
    pub rendered_frames: Arc<AtomicU64>,
}

impl RenderTask {
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(RENDER_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        debug!("render task started");

        while self.flags.is_running() {
            ticker.tick().await;
            if self.clock.is_paused() {
                continue;
            }
            let target = self.clock.now_ms();
            if target < 0 {
                continue;
            }

            let frame = match self.frames.pop_best(target) {
                Some(frame) => Some(frame),
                None => self.frames.interpolation_context(target).and_then(
                    |(prev, next, factor)| {
                        match self.interpolator.interpolate(&prev, &next, factor) {
                            Ok(frame) => Some(frame),
                            Err(e) => {
                                trace!(error = %e, "interpolation failed");
                                None
                            }
                        }
                    },
                ),
            };

            if let Some(frame) = frame {
                if let Err(e) = self.display.present(frame) {
                    debug!(error = %e, "display present failed");
                } else {
                    self.rendered_frames.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        debug!("render task finished");
    }
}
