//! # Subathon Core Library
//!
//! This library provides the core logic for a subathon countdown timer: a
//! clock that viewers extend by subscribing, cheering or tipping, and that
//! moderators adjust with chat commands. The CLI binary is a thin layer over
//! the same library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine; the caller invokes
//!   `tick()` every frame and the engine charges the real elapsed time
//! - **Inbound**: Normalizes raw host envelopes into typed events
//! - **Router**: Turns events into timer grants and chat command adjustments
//! - **Storage**: TOML configuration and a SQLite snapshot store written
//!   behind the frame loop
//! - **Widget**: Bootstrap state machine, frame loop and render sink
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`Widget`]: One running timer with persistence and a sink
//! - [`Config`]: Application configuration management
//! - [`SnapshotStore`]: Where the timer snapshot lives between runs

pub mod duration;
pub mod error;
pub mod events;
pub mod inbound;
pub mod role;
pub mod router;
pub mod storage;
pub mod tier;
pub mod timer;
pub mod widget;

pub use duration::{format_clock, human_delta, parse_duration};
pub use error::{ConfigError, CoreError, StorageError};
pub use events::Event;
pub use inbound::{InboundEvent, Subscription};
pub use role::{AccessPolicy, Actor};
pub use router::{Feedback, Handled};
pub use storage::{Config, MemoryStore, SnapshotStore, SqliteStore};
pub use tier::{Tier, TierMultipliers};
pub use timer::{now_ms, EngineSettings, RunState, Sign, TimerEngine, TimerState};
pub use widget::{Frame, HostMessage, Phase, RenderSink, Widget, WidgetDriver};
