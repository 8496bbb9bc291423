use serde::{Deserialize, Serialize};

/// Whether remaining time is currently decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Paused,
}

impl From<bool> for RunState {
    fn from(is_running: bool) -> Self {
        if is_running {
            RunState::Running
        } else {
            RunState::Paused
        }
    }
}

/// The single source of truth for the countdown, and the persisted snapshot.
///
/// Older overlay stores wrote `remaining` / `isRunning` / `lastWallClock`;
/// those keys are accepted on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    /// Seconds left. Never negative.
    #[serde(alias = "remaining")]
    pub remaining_secs: f64,
    #[serde(alias = "isRunning", default)]
    pub is_running: bool,
    /// Wall-clock instant (ms since epoch) at which `remaining_secs` was correct.
    #[serde(alias = "lastWallClock", default)]
    pub last_observed_ms: u64,
}

impl TimerState {
    pub fn new(remaining_secs: f64, is_running: bool, last_observed_ms: u64) -> Self {
        Self {
            remaining_secs: sanitize(remaining_secs),
            is_running,
            last_observed_ms,
        }
    }

    pub fn run_state(&self) -> RunState {
        RunState::from(self.is_running)
    }
}

/// Clamp to a finite, non-negative number of seconds.
pub(crate) fn sanitize(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.max(0.0)
    } else {
        0.0
    }
}
