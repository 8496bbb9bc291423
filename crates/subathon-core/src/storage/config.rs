//! TOML-based timer configuration.
//!
//! Stores:
//! - Start duration, autostart and pause-on-zero behaviour
//! - Seconds granted per subscription, gift, month, bit and currency unit
//! - Tier multipliers
//! - Chat command names, access policy and feedback template
//! - Runtime cadences (frame, persistence, bootstrap grace)
//!
//! Configuration is stored at `~/.config/subathon/config.toml`. Overlay hosts
//! that hand over a flat camelCase field map use [`Config::from_field_data`].
//! Every key is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result};
use crate::role::AccessPolicy;
use crate::tier::TierMultipliers;
use crate::timer::EngineSettings;

pub const DEFAULT_STORAGE_KEY: &str = "subathon-timer-v1";
pub const DEFAULT_FEEDBACK_FORMAT: &str = "{user} {op} {delta} → {remaining}";

/// Countdown behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_start_seconds")]
    pub start_seconds: u64,
    #[serde(default = "default_true")]
    pub autostart: bool,
    #[serde(default = "default_true")]
    pub pause_on_zero: bool,
    /// Key the snapshot is persisted under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

/// Seconds granted per support event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantsConfig {
    #[serde(default = "default_60")]
    pub sub_seconds: f64,
    /// Bonus per resub month beyond the first.
    #[serde(default)]
    pub resub_per_month_seconds: f64,
    #[serde(default = "default_60")]
    pub gift_sub_seconds: f64,
    /// Bits needed for one second.
    #[serde(default = "default_bits_per_second")]
    pub bits_per_second: f64,
    /// Currency units needed for one second.
    #[serde(default = "default_tip_per_second")]
    pub tip_per_second: f64,
}

/// Chat command configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_add_command")]
    pub add_command: String,
    #[serde(default = "default_sub_command")]
    pub sub_command: String,
    #[serde(default)]
    pub who_can_use: AccessPolicy,
    /// Show acknowledgement/rejection text for commands.
    #[serde(default = "default_true")]
    pub feedback: bool,
    #[serde(default = "default_feedback_format")]
    pub feedback_format: String,
    #[serde(default = "default_feedback_dismiss_ms")]
    pub feedback_dismiss_ms: u64,
}

/// Label shown above the clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_label: bool,
    #[serde(default = "default_label_text")]
    pub label_text: String,
}

/// Loop cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
    /// How long to wait for a host load before bootstrapping with defaults.
    #[serde(default = "default_bootstrap_grace_ms")]
    pub bootstrap_grace_ms: u64,
}

/// Timer configuration.
///
/// Serialized to/from TOML at `~/.config/subathon/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub grants: GrantsConfig,
    #[serde(default)]
    pub tiers: TierMultipliers,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_start_seconds() -> u64 {
    3_600
}
fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.into()
}
fn default_60() -> f64 {
    60.0
}
fn default_bits_per_second() -> f64 {
    10.0
}
fn default_tip_per_second() -> f64 {
    1.0
}
fn default_add_command() -> String {
    "!addtime".into()
}
fn default_sub_command() -> String {
    "!subtime".into()
}
fn default_feedback_format() -> String {
    DEFAULT_FEEDBACK_FORMAT.into()
}
fn default_feedback_dismiss_ms() -> u64 {
    2_500
}
fn default_label_text() -> String {
    "Subathon Time Remaining".into()
}
fn default_frame_interval_ms() -> u64 {
    16
}
fn default_persist_interval_ms() -> u64 {
    3_000
}
fn default_bootstrap_grace_ms() -> u64 {
    2_000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            start_seconds: default_start_seconds(),
            autostart: true,
            pause_on_zero: true,
            storage_key: default_storage_key(),
        }
    }
}

impl Default for GrantsConfig {
    fn default() -> Self {
        Self {
            sub_seconds: 60.0,
            resub_per_month_seconds: 0.0,
            gift_sub_seconds: 60.0,
            bits_per_second: default_bits_per_second(),
            tip_per_second: default_tip_per_second(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            add_command: default_add_command(),
            sub_command: default_sub_command(),
            who_can_use: AccessPolicy::default(),
            feedback: true,
            feedback_format: default_feedback_format(),
            feedback_dismiss_ms: default_feedback_dismiss_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_label: true,
            label_text: default_label_text(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            persist_interval_ms: default_persist_interval_ms(),
            bootstrap_grace_ms: default_bootstrap_grace_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    pub fn bootstrap_grace(&self) -> Duration {
        Duration::from_millis(self.bootstrap_grace_ms)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    Value::Bool(_) => Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    Value::Object(_) | Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                CoreError::Config(ConfigError::LoadFailed {
                    path: path.clone(),
                    message: e.to_string(),
                })
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.clone(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Snapshot key, trimmed; blank keys fall back to the default.
    pub fn storage_key(&self) -> &str {
        let key = self.timer.storage_key.trim();
        if key.is_empty() {
            DEFAULT_STORAGE_KEY
        } else {
            key
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            start_secs: self.timer.start_seconds as f64,
            autostart: self.timer.autostart,
            pause_on_zero: self.timer.pause_on_zero,
        }
    }

    /// Build from an overlay host's flat field map (`startSeconds`,
    /// `t2Mult`, `whoCanUse`, ...). Missing or mistyped fields keep their
    /// defaults; numeric strings are accepted.
    pub fn from_field_data(fields: &Value) -> Self {
        let f = FieldData(fields);
        let mut cfg = Self::default();

        if let Some(v) = f.number("startSeconds") {
            cfg.timer.start_seconds = v.max(0.0) as u64;
        }
        f.set_bool("autostart", &mut cfg.timer.autostart);
        f.set_bool("pauseOnZero", &mut cfg.timer.pause_on_zero);
        f.set_string("storageKey", &mut cfg.timer.storage_key);

        f.set_number("subSeconds", &mut cfg.grants.sub_seconds);
        f.set_number("resubPerMonthSeconds", &mut cfg.grants.resub_per_month_seconds);
        f.set_number("giftSubSeconds", &mut cfg.grants.gift_sub_seconds);
        f.set_number("bitsPerSecond", &mut cfg.grants.bits_per_second);
        f.set_number("tipPerSecond", &mut cfg.grants.tip_per_second);

        f.set_number("t1Mult", &mut cfg.tiers.t1);
        f.set_number("t2Mult", &mut cfg.tiers.t2);
        f.set_number("t3Mult", &mut cfg.tiers.t3);
        f.set_number("primeMult", &mut cfg.tiers.prime);
        f.set_bool("applyTierToGifts", &mut cfg.tiers.apply_to_gifts);
        f.set_bool("applyTierToResubMonths", &mut cfg.tiers.apply_to_resub_months);

        f.set_bool("enableChatCommands", &mut cfg.commands.enabled);
        f.set_string("addTimeCommand", &mut cfg.commands.add_command);
        f.set_string("subTimeCommand", &mut cfg.commands.sub_command);
        if let Some(who) = f.string("whoCanUse") {
            cfg.commands.who_can_use = AccessPolicy::from(who);
        }
        f.set_bool("commandFeedback", &mut cfg.commands.feedback);
        f.set_string("feedbackFormat", &mut cfg.commands.feedback_format);

        f.set_bool("showLabel", &mut cfg.display.show_label);
        f.set_string("labelText", &mut cfg.display.label_text);

        cfg
    }
}

/// Lenient view over a host field map.
struct FieldData<'a>(&'a Value);

impl FieldData<'_> {
    fn number(&self, key: &str) -> Option<f64> {
        let n = match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        n.is_finite().then_some(n)
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    fn set_number(&self, key: &str, slot: &mut f64) {
        if let Some(v) = self.number(key) {
            *slot = v;
        }
    }

    fn set_bool(&self, key: &str, slot: &mut bool) {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *slot = *b,
            Some(Value::String(s)) if s == "true" || s == "false" => *slot = s == "true",
            Some(Value::Number(n)) => *slot = n.as_f64().is_some_and(|f| f != 0.0),
            _ => {}
        }
    }

    fn set_string(&self, key: &str, slot: &mut String) {
        if let Some(s) = self.string(key) {
            *slot = s.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.start_seconds, 3_600);
        assert_eq!(parsed.commands.who_can_use, AccessPolicy::ModeratorsAndAbove);
        assert_eq!(parsed.tiers.t3, 6.0);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.grants.bits_per_second, 10.0);
        assert_eq!(cfg.commands.add_command, "!addtime");
        assert_eq!(cfg.commands.feedback_dismiss_ms, 2_500);
        assert_eq!(cfg.runtime.persist_interval_ms, 3_000);
        assert_eq!(cfg.storage_key(), DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            "[timer]\nstart_seconds = 90\n\n[commands]\nwho_can_use = \"everyone\"\n",
        )
        .unwrap();
        assert_eq!(cfg.timer.start_seconds, 90);
        assert!(cfg.timer.autostart);
        assert_eq!(cfg.commands.who_can_use, AccessPolicy::Everyone);
        assert_eq!(cfg.commands.sub_command, "!subtime");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.autostart").as_deref(), Some("true"));
        assert_eq!(cfg.get("timer.start_seconds").as_deref(), Some("3600"));
        assert_eq!(cfg.get("commands.who_can_use").as_deref(), Some("mods"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_value_updates_nested_fields() {
        let mut cfg = Config::default();
        cfg.set_value("timer.pause_on_zero", "false").unwrap();
        cfg.set_value("tiers.t2", "2.5").unwrap();
        cfg.set_value("commands.who_can_use", "broadcaster").unwrap();
        assert!(!cfg.timer.pause_on_zero);
        assert_eq!(cfg.tiers.t2, 2.5);
        assert_eq!(cfg.commands.who_can_use, AccessPolicy::Broadcaster);
    }

    #[test]
    fn set_value_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("timer.nonexistent", "1"),
            Err(CoreError::Config(ConfigError::UnknownKey(_)))
        ));
        assert!(matches!(
            cfg.set_value("timer.autostart", "yes"),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn storage_key_is_trimmed() {
        let mut cfg = Config::default();
        cfg.timer.storage_key = "  my-key  ".into();
        assert_eq!(cfg.storage_key(), "my-key");
        cfg.timer.storage_key = "   ".into();
        assert_eq!(cfg.storage_key(), DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn field_data_overrides_and_defaults() {
        let cfg = Config::from_field_data(&json!({
            "startSeconds": "120",
            "autostart": false,
            "t2Mult": 3,
            "whoCanUse": "everyone",
            "commandFeedback": false,
            "addTimeCommand": "!plus",
            "bitsPerSecond": "not a number"
        }));
        assert_eq!(cfg.timer.start_seconds, 120);
        assert!(!cfg.timer.autostart);
        assert!(cfg.timer.pause_on_zero);
        assert_eq!(cfg.tiers.t2, 3.0);
        assert_eq!(cfg.commands.who_can_use, AccessPolicy::Everyone);
        assert!(!cfg.commands.feedback);
        assert_eq!(cfg.commands.add_command, "!plus");
        assert_eq!(cfg.grants.bits_per_second, 10.0);
    }

    #[test]
    fn engine_settings_follow_timer_section() {
        let mut cfg = Config::default();
        cfg.timer.start_seconds = 42;
        cfg.timer.autostart = false;
        let s = cfg.engine_settings();
        assert_eq!(s.start_secs, 42.0);
        assert!(!s.autostart);
        assert!(s.pause_on_zero);
    }
}
