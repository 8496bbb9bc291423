use clap::Subcommand;
use subathon_core::storage::{Config, SnapshotStore, SqliteStore};
use subathon_core::timer::{now_ms, Sign, TimerEngine};
use subathon_core::{parse_duration, Event};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Add time (90s, 2m, 1h30m, 02:15:30)
    Add {
        duration: String,
    },
    /// Remove time, stopping at zero
    Sub {
        duration: String,
    },
    /// Pause a running timer or resume a paused one
    Toggle,
    /// Reset to the configured start time
    Reset,
}

/// The timer as persisted between CLI invocations.
pub(crate) struct StoredTimer {
    pub config: Config,
    pub engine: TimerEngine,
    store: SqliteStore,
}

impl StoredTimer {
    /// Open the store and bring the snapshot up to `now_ms`.
    ///
    /// An unreadable snapshot is an error: saving a fresh timer over it
    /// would destroy it.
    pub fn open(now_ms: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load_or_default();
        let store = SqliteStore::open()?;
        let settings = config.engine_settings();
        let engine = match store.get(config.storage_key())? {
            Some(snapshot) => TimerEngine::restore(settings, snapshot, now_ms).0,
            None => TimerEngine::new(settings, now_ms),
        };
        Ok(Self {
            config,
            engine,
            store,
        })
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.store
            .set(self.config.storage_key(), &self.engine.snapshot())?;
        Ok(())
    }
}

pub(crate) fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

fn parse_arg(duration: &str) -> Result<f64, Box<dyn std::error::Error>> {
    match parse_duration(duration) {
        0 => Err(format!("invalid duration '{duration}' (try 90s, 2m, 1h30m, 02:15:30)").into()),
        secs => Ok(secs as f64),
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let now = now_ms();
    let mut timer = StoredTimer::open(now)?;
    if let Some(event) = timer.engine.tick(now) {
        print_event(&event)?;
    }

    let event = match action {
        TimerAction::Status => timer.engine.status(now),
        TimerAction::Add { duration } => {
            let secs = parse_arg(&duration)?;
            timer
                .engine
                .add_seconds(secs, now)
                .unwrap_or_else(|| timer.engine.status(now))
        }
        TimerAction::Sub { duration } => {
            let secs = parse_arg(&duration)?;
            timer
                .engine
                .apply_command_delta(secs, Sign::Subtract, now)
                .unwrap_or_else(|| timer.engine.status(now))
        }
        TimerAction::Toggle => timer.engine.toggle_pause(now),
        TimerAction::Reset => timer.engine.reset(now),
    };
    print_event(&event)?;

    timer.save()
}
