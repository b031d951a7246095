//! Delay-gradient network trend classification.
//!
//! The receiver compares how fast media timestamps advance against how
//! fast packets actually arrive. When arrivals fall behind media time the
//! path is congesting and the sender should back off; when arrivals run
//! ahead, there is headroom. The resulting trend rides in every heartbeat.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

/// Bandwidth trend reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkTrend {
    Increase,
    Decrease,
    Hold,
}

/// Samples kept in the arrival window.
const HISTORY_SIZE: usize = 100;

/// Minimum samples before a non-`Hold` classification.
const MIN_SAMPLES: usize = 50;

/// Symmetric gradient threshold.
const GRADIENT_THRESHOLD: f64 = 0.05;

struct Arrival {
    arrival: Instant,
    media_ts_ms: i64,
}

/// Sliding window of packet arrivals with gradient classification.
pub struct ArrivalHistory {
    inner: Mutex<VecDeque<Arrival>>,
}

impl ArrivalHistory {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(HISTORY_SIZE)),
        }
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Record the arrival of a packet carrying `media_ts_ms`.
    pub fn record(&self, media_ts_ms: i64) {
        self.record_at(media_ts_ms, Instant::now());
    }

    pub(crate) fn record_at(&self, media_ts_ms: i64, arrival: Instant) {
        let mut history = self.inner.lock().unwrap();
        history.push_back(Arrival {
            arrival,
            media_ts_ms,
        });
        while history.len() > HISTORY_SIZE {
            history.pop_front();
        }
    }

    /// Classify the current window.
    ///
    /// `gradient = (arrival_delta - media_delta) / media_delta` over the
    /// oldest and newest samples; a positive gradient means delivery is
    /// slower than the media clock.
    pub fn trend(&self) -> NetworkTrend {
        let history = self.inner.lock().unwrap();
        if history.len() < MIN_SAMPLES {
            return NetworkTrend::Hold;
        }

        let front = history.front().unwrap();
        let back = history.back().unwrap();
        let media_delta = back.media_ts_ms - front.media_ts_ms;
        if media_delta <= 0 {
            return NetworkTrend::Hold;
        }
        let arrival_delta = back.arrival.duration_since(front.arrival).as_millis() as i64;

        let gradient = (arrival_delta - media_delta) as f64 / media_delta as f64;
        if gradient > GRADIENT_THRESHOLD {
            NetworkTrend::Decrease
        } else if gradient < -GRADIENT_THRESHOLD {
            NetworkTrend::Increase
        } else {
            NetworkTrend::Hold
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ArrivalHistory {
    fn default() -> Self {
        Self::new()
    }
}
