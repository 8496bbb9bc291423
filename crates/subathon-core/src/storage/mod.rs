mod config;
pub mod database;
pub mod write_behind;

pub use config::{
    CommandsConfig, Config, DisplayConfig, GrantsConfig, RuntimeConfig, TimerConfig,
    DEFAULT_FEEDBACK_FORMAT, DEFAULT_STORAGE_KEY,
};
pub use database::{MemoryStore, SnapshotStore, SqliteStore};
pub use write_behind::{PersistWorker, WriteBehind};

use std::path::PathBuf;

use crate::error::Result;

/// Returns `~/.config/subathon[-dev]/` based on SUBATHON_ENV.
///
/// Set SUBATHON_ENV=dev to use the development data directory, or
/// SUBATHON_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("SUBATHON_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("SUBATHON_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("subathon-dev")
            } else {
                base_dir.join("subathon")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
