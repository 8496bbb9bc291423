use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "subathon-cli", version, about = "Subathon timer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Feed one raw host event (JSON) to the persisted timer
    Event {
        /// Event envelope, e.g. '{"listener":"cheer-latest","event":{"type":"cheer","amount":500}}'
        json: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the live timer, reading JSON events from stdin
    Run(commands::run::RunArgs),
    /// Parse a duration and show how the timer reads it
    Parse {
        /// Duration, e.g. 90s, 2m, 1h30m, 02:15:30
        input: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SUBATHON_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Event { json } => commands::event::run(&json),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run(args) => commands::run::run(args),
        Commands::Parse { input } => commands::parse::run(&input),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
