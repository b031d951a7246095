//! Audio-driven master clock.
//!
//! The clock maps wall time onto media time. The audio consumer starts it
//! with the pts of the first audio packet it plays; every other consumer
//! (renderer, lateness checks) reads media time from here. Reads are
//! lock-free; start/seek/pause/resume transitions serialize on a mutex.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

pub struct MasterClock {
    epoch: Instant,
    started: AtomicBool,
    paused: AtomicBool,
    start_wall_ms: AtomicI64,
    start_pts_ms: AtomicI64,
    paused_at_pts_ms: AtomicI64,
    transition: Mutex<()>,
}

impl MasterClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            started: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            start_wall_ms: AtomicI64::new(0),
            start_pts_ms: AtomicI64::new(0),
            paused_at_pts_ms: AtomicI64::new(-1),
            transition: Mutex::new(()),
        }
    }

    fn wall_now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    /// Return to the unstarted state.
    pub fn reset(&self) {
        let _guard = self.transition.lock().unwrap();
        self.started.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.start_wall_ms.store(0, Ordering::SeqCst);
        self.start_pts_ms.store(0, Ordering::SeqCst);
        self.paused_at_pts_ms.store(-1, Ordering::SeqCst);
    }

    /// Start the clock at `pts_ms`. Idempotent: only the first caller after
    /// a reset anchors the clock.
    pub fn start(&self, pts_ms: i64) {
        let _guard = self.transition.lock().unwrap();
        if self.started.load(Ordering::SeqCst) {
            return;
        }
        self.start_wall_ms.store(self.wall_now_ms(), Ordering::SeqCst);
        self.start_pts_ms.store(pts_ms, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);
        tracing::debug!(pts_ms, "master clock started");
    }

    /// Jump the clock to `pts_ms`, starting it if necessary.
    pub fn seek(&self, pts_ms: i64) {
        let _guard = self.transition.lock().unwrap();
        self.start_wall_ms.store(self.wall_now_ms(), Ordering::SeqCst);
        self.start_pts_ms.store(pts_ms, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);
        if self.paused.load(Ordering::SeqCst) {
            self.paused_at_pts_ms.store(pts_ms, Ordering::SeqCst);
        }
        tracing::debug!(pts_ms, "master clock seeked");
    }

    /// Current media time in milliseconds. `-1` before the clock starts;
    /// frozen at the pause point while paused.
    pub fn now_ms(&self) -> i64 {
        if !self.started.load(Ordering::SeqCst) {
            return -1;
        }
        if self.paused.load(Ordering::SeqCst) {
            return self.paused_at_pts_ms.load(Ordering::SeqCst);
        }
        (self.wall_now_ms() - self.start_wall_ms.load(Ordering::SeqCst))
            + self.start_pts_ms.load(Ordering::SeqCst)
    }

    /// Freeze media time at its current value.
    pub fn pause(&self) {
        let _guard = self.transition.lock().unwrap();
        if !self.paused.swap(true, Ordering::SeqCst) {
            let now = if self.started.load(Ordering::SeqCst) {
                (self.wall_now_ms() - self.start_wall_ms.load(Ordering::SeqCst))
                    + self.start_pts_ms.load(Ordering::SeqCst)
            } else {
                -1
            };
            self.paused_at_pts_ms.store(now, Ordering::SeqCst);
            tracing::debug!(paused_at = now, "master clock paused");
        }
    }

    /// Continue from the pause point.
    pub fn resume(&self) {
        let _guard = self.transition.lock().unwrap();
        if self.paused.swap(false, Ordering::SeqCst) {
            self.start_wall_ms.store(self.wall_now_ms(), Ordering::SeqCst);
            self.start_pts_ms
                .store(self.paused_at_pts_ms.load(Ordering::SeqCst), Ordering::SeqCst);
            tracing::debug!(
                from = self.start_pts_ms.load(Ordering::SeqCst),
                "master clock resumed"
            );
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

impl Default for MasterClock {
    fn default() -> Self {
        Self::new()
    }
}
