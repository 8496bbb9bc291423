use clap::Subcommand;
use subathon_core::{Config, ConfigError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value, e.g. `grants.sub_seconds` or `commands.who_can_use`
    Get { key: String },
    /// Change one value and save; prints the value as stored
    Set { key: String, value: String },
    /// Print the config file, or one section of it (`timer`, `grants`, ...)
    #[command(alias = "list")]
    Show { section: Option<String> },
    /// Overwrite the config file with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            let stored = config.get(&key).unwrap_or(value);
            println!("{key} = {stored}");
        }
        ConfigAction::Show { section } => {
            let config = Config::load()?;
            println!("{}", render_toml(&config, section.as_deref())?);
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            tracing::info!("config reset to defaults");
        }
    }
    Ok(())
}

fn render_toml(config: &Config, section: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    let doc = toml::Value::try_from(config)?;
    let Some(name) = section else {
        return Ok(toml::to_string_pretty(&doc)?);
    };
    match doc.get(name) {
        Some(table @ toml::Value::Table(_)) => Ok(toml::to_string_pretty(table)?),
        _ => Err(ConfigError::UnknownKey(name.to_string()).into()),
    }
}
