mod engine;
mod state;

pub use engine::{now_ms, EngineSettings, Sign, TimerEngine};
pub use state::{RunState, TimerState};
