//! Timer engine implementation.
//!
//! The engine is a wall-clock-delta countdown. It stores remaining seconds
//! plus the instant they were last correct, and derives elapsed time on every
//! `tick()`. It does not own a thread or a clock: every operation receives the
//! current instant from the caller.
//!
//! ## State Transitions
//!
//! ```text
//! Running --tick hits zero (pause_on_zero)--> Paused
//! Paused  --grant leaves time > 0 (pause_on_zero)--> Running
//! toggle_pause flips, reset follows `autostart`
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings, now_ms());
//! // Once per frame:
//! engine.tick(now_ms());
//! // From an event handler:
//! engine.add_seconds(120.0, now_ms());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{sanitize, RunState, TimerState};
use crate::duration::format_clock;
use crate::events::Event;

/// The slice of configuration the engine itself needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub start_secs: f64,
    pub autostart: bool,
    pub pause_on_zero: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            start_secs: 3_600.0,
            autostart: true,
            pause_on_zero: true,
        }
    }
}

/// Direction of a chat-command adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Add,
    Subtract,
}

impl Sign {
    fn apply(self, secs: f64) -> f64 {
        match self {
            Sign::Add => secs,
            Sign::Subtract => -secs,
        }
    }
}

/// Core countdown engine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: EngineSettings,
    state: TimerState,
}

impl TimerEngine {
    /// Fresh engine: remaining from `start_secs`, running per `autostart`.
    pub fn new(settings: EngineSettings, now_ms: u64) -> Self {
        Self {
            state: TimerState::new(settings.start_secs, settings.autostart, now_ms),
            settings,
        }
    }

    /// Rebuild from a persisted snapshot, charging a running timer for the
    /// time that passed while nobody was ticking it.
    ///
    /// A snapshot stamped in the future (clock moved backwards) is charged
    /// nothing.
    pub fn restore(settings: EngineSettings, snapshot: TimerState, now_ms: u64) -> (Self, Event) {
        let mut state = TimerState::new(
            snapshot.remaining_secs,
            snapshot.is_running,
            snapshot.last_observed_ms,
        );
        let elapsed = if state.is_running {
            let elapsed = elapsed_secs(state.last_observed_ms, now_ms);
            state.remaining_secs = (state.remaining_secs - elapsed).max(0.0);
            elapsed
        } else {
            0.0
        };
        state.last_observed_ms = now_ms;

        let event = Event::StateRestored {
            remaining_secs: state.remaining_secs,
            elapsed_while_absent_secs: elapsed,
            state: state.run_state(),
            at: at(now_ms),
        };
        (Self { settings, state }, event)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> TimerState {
        self.state.clone()
    }

    pub fn remaining_secs(&self) -> f64 {
        self.state.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state()
    }

    pub fn last_observed_ms(&self) -> u64 {
        self.state.last_observed_ms
    }

    pub fn formatted(&self) -> String {
        format_clock(self.state.remaining_secs)
    }

    /// Build a full state snapshot event.
    pub fn status(&self, now_ms: u64) -> Event {
        Event::StateSnapshot {
            state: self.run_state(),
            remaining_secs: self.state.remaining_secs,
            formatted: self.formatted(),
            at: at(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply wall-clock time elapsed since the last observation.
    ///
    /// Returns `Some(Event::ReachedZero)` on the tick that auto-pauses.
    pub fn tick(&mut self, now_ms: u64) -> Option<Event> {
        self.catch_up(now_ms);

        if self.settings.pause_on_zero && self.state.is_running && self.state.remaining_secs <= 0.0
        {
            self.state.is_running = false;
            return Some(Event::ReachedZero { at: at(now_ms) });
        }
        None
    }

    /// Grant time. Ignores anything that is not a finite positive number.
    pub fn add_seconds(&mut self, secs: f64, now_ms: u64) -> Option<Event> {
        if !secs.is_finite() || secs <= 0.0 {
            return None;
        }
        self.catch_up(now_ms);
        self.state.remaining_secs = saturating_add(self.state.remaining_secs, secs);
        self.revive();
        Some(Event::TimeAdded {
            seconds: secs,
            remaining_secs: self.state.remaining_secs,
            at: at(now_ms),
        })
    }

    /// Signed adjustment used by chat commands; floors at zero.
    pub fn apply_command_delta(&mut self, secs: f64, sign: Sign, now_ms: u64) -> Option<Event> {
        if !secs.is_finite() || secs <= 0.0 {
            return None;
        }
        let delta = sign.apply(secs);
        self.catch_up(now_ms);
        self.state.remaining_secs = saturating_add(self.state.remaining_secs, delta).max(0.0);
        self.revive();
        Some(Event::TimeAdjusted {
            seconds: delta,
            remaining_secs: self.state.remaining_secs,
            at: at(now_ms),
        })
    }

    pub fn toggle_pause(&mut self, now_ms: u64) -> Event {
        if self.state.is_running {
            self.set_running(false, now_ms)
        } else {
            self.set_running(true, now_ms)
        }
    }

    /// Start counting down. `None` when already running.
    pub fn start(&mut self, now_ms: u64) -> Option<Event> {
        if self.state.is_running {
            return None;
        }
        Some(self.set_running(true, now_ms))
    }

    /// Stop counting down. `None` when already paused.
    pub fn pause(&mut self, now_ms: u64) -> Option<Event> {
        if !self.state.is_running {
            return None;
        }
        Some(self.set_running(false, now_ms))
    }

    pub fn reset(&mut self, now_ms: u64) -> Event {
        self.state = TimerState::new(self.settings.start_secs, self.settings.autostart, now_ms);
        Event::TimerReset {
            remaining_secs: self.state.remaining_secs,
            state: self.run_state(),
            at: at(now_ms),
        }
    }

    /// Swap in new settings, keeping the live countdown.
    pub fn reconfigure(&mut self, settings: EngineSettings, now_ms: u64) {
        self.catch_up(now_ms);
        self.settings = settings;
    }

    /// Startup rule: with `autostart`, a timer that still has time runs.
    pub fn apply_autostart(&mut self, now_ms: u64) -> Option<Event> {
        if self.settings.autostart && self.state.remaining_secs > 0.0 && !self.state.is_running {
            return Some(self.set_running(true, now_ms));
        }
        None
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn set_running(&mut self, running: bool, now_ms: u64) -> Event {
        self.catch_up(now_ms);
        self.state.is_running = running;
        let remaining_secs = self.state.remaining_secs;
        if running {
            Event::TimerResumed {
                remaining_secs,
                at: at(now_ms),
            }
        } else {
            Event::TimerPaused {
                remaining_secs,
                at: at(now_ms),
            }
        }
    }

    /// Grants wake a timer that pause-on-zero stopped.
    fn revive(&mut self) {
        if self.settings.pause_on_zero && self.state.remaining_secs > 0.0 {
            self.state.is_running = true;
        }
    }

    /// Charge a running timer for the time since the last observation.
    fn catch_up(&mut self, now_ms: u64) {
        if self.state.is_running {
            let dt = elapsed_secs(self.state.last_observed_ms, now_ms);
            self.state.remaining_secs = (self.state.remaining_secs - dt).max(0.0);
        }
        self.observe(now_ms);
    }

    /// Follow the wall clock. A step backwards was already charged zero by
    /// `catch_up`; counting resumes from the new instant.
    fn observe(&mut self, now_ms: u64) {
        self.state.last_observed_ms = now_ms;
        self.state.remaining_secs = sanitize(self.state.remaining_secs);
    }
}

/// Grants have no upper bound, but an overflow to infinity pins at `f64::MAX`.
fn saturating_add(a: f64, b: f64) -> f64 {
    let sum = a + b;
    if sum.is_finite() {
        sum
    } else {
        f64::MAX
    }
}

fn elapsed_secs(last_ms: u64, now_ms: u64) -> f64 {
    now_ms.saturating_sub(last_ms) as f64 / 1000.0
}

fn at(now_ms: u64) -> DateTime<Utc> {
    i64::try_from(now_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

/// Current wall-clock time in ms since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
