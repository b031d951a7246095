//! Adaptive bitrate controller.
//!
//! The controller owns a quality ladder filtered to the source resolution
//! and walks it with hysteresis: client trend feedback moves the bitrate
//! multiplicatively inside the current level, and only a sustained stay at
//! a level boundary changes the level itself. The encoder reads the
//! current decision lock-free on every frame.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::info;

use crate::trend::NetworkTrend;

/// One rung of the quality ladder. Bitrates are bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityLevel {
    pub height: u32,
    pub width: u32,
    pub target_fps: u32,
    pub min_bitrate: i64,
    pub max_bitrate: i64,
    pub start_bitrate: i64,
}

const KBIT: i64 = 1024;

/// Ladder template, highest quality first.
pub const LADDER_TEMPLATE: [QualityLevel; 5] = [
    QualityLevel {
        height: 2160,
        width: 3840,
        target_fps: 60,
        min_bitrate: 4000 * KBIT,
        max_bitrate: 30000 * KBIT,
        start_bitrate: 8000 * KBIT,
    },
    QualityLevel {
        height: 1440,
        width: 2560,
        target_fps: 60,
        min_bitrate: 2000 * KBIT,
        max_bitrate: 8000 * KBIT,
        start_bitrate: 3000 * KBIT,
    },
    QualityLevel {
        height: 1080,
        width: 1920,
        target_fps: 60,
        min_bitrate: 500 * KBIT,
        max_bitrate: 4000 * KBIT,
        start_bitrate: 1500 * KBIT,
    },
    QualityLevel {
        height: 720,
        width: 1280,
        target_fps: 30,
        min_bitrate: 200 * KBIT,
        max_bitrate: 1500 * KBIT,
        start_bitrate: 800 * KBIT,
    },
    QualityLevel {
        height: 480,
        width: 640,
        target_fps: 30,
        min_bitrate: 100 * KBIT,
        max_bitrate: 800 * KBIT,
        start_bitrate: 400 * KBIT,
    },
];

/// Keep only levels the source can feed; a tiny source still gets the
/// lowest rung.
pub fn build_ladder(source_height: u32) -> Vec<QualityLevel> {
    let mut ladder: Vec<QualityLevel> = LADDER_TEMPLATE
        .iter()
        .copied()
        .filter(|level| level.height <= source_height)
        .collect();
    if ladder.is_empty() {
        ladder.push(LADDER_TEMPLATE[LADDER_TEMPLATE.len() - 1]);
    }
    ladder
}

/// What the encoder should produce right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbrDecision {
    pub bitrate_bps: i64,
    pub target_fps: u32,
    pub target_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeState {
    Stable,
    ConsideringUpgrade,
    ConsideringDowngrade,
}

const INCREASE_FACTOR: f64 = 1.10;
const DECREASE_FACTOR: f64 = 0.85;
const UPGRADE_CONFIRMATION: Duration = Duration::from_secs(5);
const DOWNGRADE_CONFIRMATION: Duration = Duration::from_secs(8);

struct ControlState {
    ladder: Vec<QualityLevel>,
    level_index: usize,
    change_state: ChangeState,
    change_since: Instant,
}

pub struct AbrController {
    state: Mutex<ControlState>,
    // Decision mirror for lock-free encoder reads.
    bitrate_bps: AtomicI64,
    target_fps: AtomicU32,
    target_height: AtomicU32,
}

impl AbrController {
    /// Build a controller for a source of the given resolution, starting at
    /// the highest level the source supports.
    pub fn new(source_width: u32, source_height: u32) -> Self {
        let ladder = build_ladder(source_height);
        let initial = ladder[0];
        info!(
            source_width,
            source_height,
            start_height = initial.height,
            start_fps = initial.target_fps,
            start_kbps = initial.start_bitrate / KBIT,
            "abr initialized"
        );
        Self {
            state: Mutex::new(ControlState {
                ladder,
                level_index: 0,
                change_state: ChangeState::Stable,
                change_since: Instant::now(),
            }),
            bitrate_bps: AtomicI64::new(initial.start_bitrate),
            target_fps: AtomicU32::new(initial.target_fps),
            target_height: AtomicU32::new(initial.height),
        }
    }

    /// Current encoding decision. Lock-free.
    pub fn decision(&self) -> AbrDecision {
        AbrDecision {
            bitrate_bps: self.bitrate_bps.load(Ordering::Relaxed),
            target_fps: self.target_fps.load(Ordering::Relaxed),
            target_height: self.target_height.load(Ordering::Relaxed),
        }
    }

    /// Apply one round of client trend feedback.
    pub fn feedback(&self, trend: NetworkTrend) {
        self.feedback_at(trend, Instant::now());
    }

    pub(crate) fn feedback_at(&self, trend: NetworkTrend, now: Instant) {
        let mut state = self.state.lock().unwrap();
        let level = state.ladder[state.level_index];

        let current = self.bitrate_bps.load(Ordering::Relaxed);
        let adjusted = match trend {
            NetworkTrend::Increase => (current as f64 * INCREASE_FACTOR) as i64,
            NetworkTrend::Decrease => (current as f64 * DECREASE_FACTOR) as i64,
            NetworkTrend::Hold => current,
        };
        let clamped = adjusted.clamp(level.min_bitrate, level.max_bitrate);
        if clamped != current {
            self.bitrate_bps.store(clamped, Ordering::Relaxed);
        }

        let can_upgrade = state.level_index > 0 && clamped >= level.max_bitrate;
        let can_downgrade =
            state.level_index + 1 < state.ladder.len() && clamped <= level.min_bitrate;

        if can_upgrade {
            if state.change_state != ChangeState::ConsideringUpgrade {
                state.change_state = ChangeState::ConsideringUpgrade;
                state.change_since = now;
            }
            if now.duration_since(state.change_since) >= UPGRADE_CONFIRMATION {
                state.level_index -= 1;
                let next = state.ladder[state.level_index];
                self.apply_level(next);
                state.change_state = ChangeState::Stable;
                info!(height = next.height, fps = next.target_fps, "abr upgrade confirmed");
            }
        } else if can_downgrade {
            if state.change_state != ChangeState::ConsideringDowngrade {
                state.change_state = ChangeState::ConsideringDowngrade;
                state.change_since = now;
            }
            if now.duration_since(state.change_since) >= DOWNGRADE_CONFIRMATION {
                state.level_index += 1;
                let next = state.ladder[state.level_index];
                self.apply_level(next);
                state.change_state = ChangeState::Stable;
                info!(height = next.height, fps = next.target_fps, "abr downgrade confirmed");
            }
        } else {
            state.change_state = ChangeState::Stable;
        }
    }

    fn apply_level(&self, level: QualityLevel) {
        self.bitrate_bps.store(level.start_bitrate, Ordering::Relaxed);
        self.target_fps.store(level.target_fps, Ordering::Relaxed);
        self.target_height.store(level.height, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_filtered_by_source_height() {
        let ladder = build_ladder(720);
        let heights: Vec<u32> = ladder.iter().map(|l| l.height).collect();
        assert_eq!(heights, vec![720, 480]);
    }

    #[test]
    fn test_tiny_source_keeps_lowest_level() {
        let ladder = build_ladder(240);
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder[0].height, 480);
    }

    #[test]
    fn test_initial_decision_is_top_level_start_bitrate() {
        let abr = AbrController::new(1920, 1080);
        let decision = abr.decision();
        assert_eq!(decision.target_height, 1080);
        assert_eq!(decision.target_fps, 60);
        assert_eq!(decision.bitrate_bps, 1500 * KBIT);
    }

    #[test]
    fn test_bitrate_adjusts_and_clamps() {
        let abr = AbrController::new(640, 480);
        let level = LADDER_TEMPLATE[4];
        let now = Instant::now();

        abr.feedback_at(NetworkTrend::Decrease, now);
        let expected = (level.start_bitrate as f64 * DECREASE_FACTOR) as i64;
        assert_eq!(abr.decision().bitrate_bps, expected);

        // Decay to the floor and stay clamped there.
        for i in 0..50 {
            abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_millis(i));
        }
        assert_eq!(abr.decision().bitrate_bps, level.min_bitrate);
    }

    #[test]
    fn test_upgrade_needs_five_sustained_seconds() {
        let abr = AbrController::new(1920, 1080);
        let now = Instant::now();

        // Drop to 720p first: decay to the 1080p floor, then hold 8s.
        for i in 0..200 {
            abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_millis(i));
        }
        abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_secs(9));
        assert_eq!(abr.decision().target_height, 720);
        assert_eq!(abr.decision().bitrate_bps, LADDER_TEMPLATE[3].start_bitrate);

        // Climb to the 720p ceiling.
        let climb_start = now + Duration::from_secs(10);
        for i in 0..200 {
            abr.feedback_at(NetworkTrend::Increase, climb_start + Duration::from_millis(i));
        }
        assert_eq!(abr.decision().bitrate_bps, LADDER_TEMPLATE[3].max_bitrate);
        assert_eq!(abr.decision().target_height, 720, "no early upgrade");

        // Inside the confirmation window: still 720p.
        abr.feedback_at(NetworkTrend::Increase, climb_start + Duration::from_millis(4000));
        assert_eq!(abr.decision().target_height, 720);

        // Past 5 s pegged at max: upgrade with the new start bitrate.
        abr.feedback_at(NetworkTrend::Increase, climb_start + Duration::from_millis(5500));
        assert_eq!(abr.decision().target_height, 1080);
        assert_eq!(abr.decision().bitrate_bps, LADDER_TEMPLATE[2].start_bitrate);
    }

    #[test]
    fn test_downgrade_after_eight_seconds_at_floor() {
        let abr = AbrController::new(1920, 1080);
        let now = Instant::now();
        for i in 0..200 {
            abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_millis(i));
        }
        assert_eq!(abr.decision().bitrate_bps, LADDER_TEMPLATE[2].min_bitrate);
        assert_eq!(abr.decision().target_height, 1080);

        abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_millis(7500));
        assert_eq!(abr.decision().target_height, 1080, "not yet confirmed");

        abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_secs(9));
        let decision = abr.decision();
        assert_eq!(decision.target_height, 720);
        assert_eq!(decision.target_fps, 30);
        assert_eq!(decision.bitrate_bps, LADDER_TEMPLATE[3].start_bitrate);
    }

    #[test]
    fn test_recovery_resets_hysteresis() {
        let abr = AbrController::new(1920, 1080);
        let now = Instant::now();
        for i in 0..200 {
            abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_millis(i));
        }
        // Healthy bitrate again before the 8 s window elapses.
        for i in 0..5 {
            abr.feedback_at(NetworkTrend::Increase, now + Duration::from_secs(1) + Duration::from_millis(i));
        }
        // Back at the floor: the confirmation clock must restart.
        for i in 0..200 {
            abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_secs(2) + Duration::from_millis(i));
        }
        abr.feedback_at(NetworkTrend::Decrease, now + Duration::from_secs(9));
        assert_eq!(abr.decision().target_height, 1080, "window restarted on recovery");
    }
}
