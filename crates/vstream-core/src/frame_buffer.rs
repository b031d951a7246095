//! Decoded frame buffer.
//!
//! Holds decoded video frames sorted by presentation timestamp. The
//! renderer asks for the best frame at the clock's current media time;
//! everything at or before the returned frame is evicted so memory is
//! released as playback advances.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::frame::VideoFrame;

/// Default target buffering depth in milliseconds.
const DEFAULT_TARGET_BUFFER_MS: i64 = 100;

pub struct FrameBuffer {
    inner: Mutex<Inner>,
}

struct Inner {
    queue: VecDeque<VideoFrame>,
    last_played_pts: i64,
    target_buffer_ms: i64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                last_played_pts: -1,
                target_buffer_ms: DEFAULT_TARGET_BUFFER_MS,
            }),
        }
    }

    /// Drop all frames and forget playback progress.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.clear();
        inner.last_played_pts = -1;
    }

    /// Insert a frame keeping the queue sorted by pts.
    pub fn push(&self, frame: VideoFrame) {
        let mut inner = self.inner.lock().unwrap();
        let pos = inner
            .queue
            .iter()
            .position(|f| f.pts_ms > frame.pts_ms)
            .unwrap_or(inner.queue.len());
        inner.queue.insert(pos, frame);
    }

    /// Take the frame with the largest pts at or before `target_pts_ms` and
    /// evict everything up to it. `None` when the buffer is empty or every
    /// frame is still in the future.
    pub fn pop_best(&self, target_pts_ms: i64) -> Option<VideoFrame> {
        if target_pts_ms < 0 {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        let best = inner
            .queue
            .iter()
            .take_while(|f| f.pts_ms <= target_pts_ms)
            .count();
        if best == 0 {
            return None;
        }
        // Frames before the chosen one are late and never shown.
        for _ in 0..best - 1 {
            inner.queue.pop_front();
        }
        let frame = inner.queue.pop_front()?;
        inner.last_played_pts = frame.pts_ms;
        Some(frame)
    }

    /// Neighbouring frames around `target_pts_ms` for interpolation, with
    /// the blend factor in `(0, 1)`. Frames are cloned; the queue is left
    /// untouched.
    pub fn interpolation_context(&self, target_pts_ms: i64) -> Option<(VideoFrame, VideoFrame, f64)> {
        let inner = self.inner.lock().unwrap();
        let next_pos = inner.queue.iter().position(|f| f.pts_ms >= target_pts_ms)?;
        if next_pos == 0 {
            return None;
        }
        let prev = &inner.queue[next_pos - 1];
        let next = &inner.queue[next_pos];
        if prev.pts_ms >= target_pts_ms || next.pts_ms <= target_pts_ms {
            return None;
        }
        let factor =
            (target_pts_ms - prev.pts_ms) as f64 / (next.pts_ms - prev.pts_ms) as f64;
        Some((prev.clone(), next.clone(), factor))
    }

    /// Time span covered by the buffered frames.
    pub fn duration_ms(&self) -> i64 {
        let inner = self.inner.lock().unwrap();
        match (inner.queue.front(), inner.queue.back()) {
            (Some(front), Some(back)) if inner.queue.len() >= 2 => back.pts_ms - front.pts_ms,
            _ => 0,
        }
    }

    pub fn set_target_buffer_ms(&self, ms: i64) {
        self.inner.lock().unwrap().target_buffer_ms = ms;
    }

    pub fn target_buffer_ms(&self) -> i64 {
        self.inner.lock().unwrap().target_buffer_ms
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
