//! Wall-clock pacing of outgoing frames.
//!
//! The sender emits each frame when real time has advanced as far past the
//! anchor as the frame's pts is past the first pts. Pausing freezes the
//! schedule; resuming shifts the anchor by the paused interval so pts keep
//! mapping onto the same wall-clock cadence. A seek clears the anchor pts
//! until the next frame re-establishes it.

use std::time::{Duration, Instant};

pub struct Pacer {
    start_wall: Instant,
    first_pts: Option<i64>,
    paused_at: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self {
            start_wall: Instant::now(),
            first_pts: None,
            paused_at: None,
        }
    }

    /// Wall-clock instant at which a frame with `pts` is due. The first
    /// frame after construction or re-anchoring is due immediately and
    /// anchors the schedule.
    pub fn due_at(&mut self, pts: i64) -> Instant {
        if self.first_pts.is_none() {
            self.start_wall = Instant::now();
            self.first_pts = Some(pts);
        }
        let first = self.first_pts.expect("anchored above");
        let offset = pts - first;
        if offset <= 0 {
            self.start_wall
        } else {
            self.start_wall + Duration::from_millis(offset as u64)
        }
    }

    /// Remaining wait before a frame with `pts` is due. Zero when late.
    pub fn delay_for(&mut self, pts: i64) -> Duration {
        self.due_at(pts).saturating_duration_since(Instant::now())
    }

    /// Record the pause entry point. Idempotent.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// Shift the anchor by the paused interval so the schedule continues
    /// where it stopped.
    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.start_wall += paused_at.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Forget the anchor pts; the next `due_at` re-anchors. Used after a
    /// seek flush.
    pub fn reanchor(&mut self) {
        self.first_pts = None;
        self.paused_at = None;
    }

    /// Anchor the schedule at `pts` now, regardless of which frame is
    /// paced first. Used when the anchor frame is known before it is due.
    pub fn anchor_at(&mut self, pts: i64) {
        self.start_wall = Instant::now();
        self.first_pts = Some(pts);
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}
