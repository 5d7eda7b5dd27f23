//! CLI Module
//!
//! Command-line interface for offline rendering and inspection.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::CurveType;
use crate::output::OutputMode;
use crate::transition::TransitionType;

/// Deckflow - multi-lane DJ mix engine
#[derive(Parser, Debug)]
#[command(name = "deckflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a session to a WAV file through the master bus
    #[command(name = "render")]
    Render {
        /// Session description (JSON)
        session: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Engine configuration (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Render length in seconds; defaults to the end of the last clip
        #[arg(short, long)]
        seconds: Option<f64>,
    },

    /// List output devices
    #[command(name = "devices")]
    Devices {
        /// Output tier to query
        #[arg(short, long, default_value = "shared")]
        mode: OutputMode,
    },

    /// Print the automation of a transition across its progress
    #[command(name = "automation")]
    Automation {
        /// Transition type
        #[arg(short, long, default_value = "crossfade")]
        kind: TransitionType,

        /// Curve shape
        #[arg(short, long, default_value = "linear")]
        curve: CurveType,

        /// Number of rows
        #[arg(long, default_value_t = 10)]
        steps: u32,
    },

    /// Write a default engine configuration
    #[command(name = "init-config")]
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "deckflow",
            "-v",
            "render",
            "set.json",
            "-o",
            "mix.wav",
            "--seconds",
            "30",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Render {
                session,
                output,
                config,
                seconds,
            }) => {
                assert_eq!(session, PathBuf::from("set.json"));
                assert_eq!(output, PathBuf::from("mix.wav"));
                assert!(config.is_none());
                assert_eq!(seconds, Some(30.0));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_automation_values() {
        let cli = Cli::try_parse_from([
            "deckflow",
            "automation",
            "--kind",
            "eq-swap",
            "--curve",
            "s-curve",
            "--steps",
            "4",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Automation { kind, curve, steps }) => {
                assert_eq!(kind, TransitionType::EqSwap);
                assert_eq!(curve, CurveType::SCurve);
                assert_eq!(steps, 4);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
