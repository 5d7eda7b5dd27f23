//! Deckflow CLI
//!
//! Command-line interface for the Deckflow mix engine.

use clap::Parser;
use env_logger::Env;
use log::debug;

use deckflow::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("Deckflow v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Deckflow v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            session,
            output,
            config,
            seconds,
        } => commands::render(&session, &output, config.as_deref(), seconds),
        Commands::Devices { mode } => commands::devices(mode),
        Commands::Automation { kind, curve, steps } => commands::automation(kind, curve, steps),
        Commands::InitConfig { path } => commands::init_config(&path),
    }
}
