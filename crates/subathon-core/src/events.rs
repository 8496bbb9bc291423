use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::RunState;

/// Every state change of the timer produces an Event.
/// Hosts print or forward them; the widget uses them to mark state dirty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Time granted by a subscription, cheer, tip or manual add.
    TimeAdded {
        seconds: f64,
        remaining_secs: f64,
        at: DateTime<Utc>,
    },
    /// Signed adjustment from a chat command. `seconds` is negative for removals.
    TimeAdjusted {
        seconds: f64,
        remaining_secs: f64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: f64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: f64,
        at: DateTime<Utc>,
    },
    TimerReset {
        remaining_secs: f64,
        state: RunState,
        at: DateTime<Utc>,
    },
    /// The countdown hit zero and pause-on-zero stopped it.
    ReachedZero {
        at: DateTime<Utc>,
    },
    /// A persisted snapshot was loaded and reconciled.
    StateRestored {
        remaining_secs: f64,
        elapsed_while_absent_secs: f64,
        state: RunState,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: RunState,
        remaining_secs: f64,
        formatted: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Remaining seconds carried by the event, if it reports one.
    pub fn remaining_secs(&self) -> Option<f64> {
        match self {
            Event::TimeAdded { remaining_secs, .. }
            | Event::TimeAdjusted { remaining_secs, .. }
            | Event::TimerPaused { remaining_secs, .. }
            | Event::TimerResumed { remaining_secs, .. }
            | Event::TimerReset { remaining_secs, .. }
            | Event::StateRestored { remaining_secs, .. }
            | Event::StateSnapshot { remaining_secs, .. } => Some(*remaining_secs),
            Event::ReachedZero { .. } => None,
        }
    }
}
