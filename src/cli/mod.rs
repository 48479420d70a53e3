use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "tutor-guard")]
#[command(about = "Gesture debouncing and presence-based workstation locking")]
#[command(long_about = "tutor-guard turns per-frame gesture and face observations into debounced \
                       desktop actions and a staged lock sequence. Observations arrive as JSON lines, \
                       either from a recorded log ('tutor-guard replay') or live on stdin ('tutor-guard watch').")]
pub struct Cli {
    /// Configuration file (defaults to ./tutor.toml when present)
    #[arg(long, short = 'c', global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a recorded observation log and print the decisions it produces
    Replay {
        /// JSON-lines observation log
        file: PathBuf,
        /// Print events and summary as JSON
        #[arg(long, help = "Emit machine-readable JSON instead of text")]
        json: bool,
    },
    /// Drive the configured effectors from observations streamed on stdin
    Watch {
        /// Read from this file instead of stdin
        #[arg(long, help = "Read observations from a file instead of stdin")]
        input: Option<PathBuf>,
        /// Observations in flight between the reader and the engine
        #[arg(long, default_value = "64", help = "Maximum number of observations queued ahead of the engine")]
        queue: usize,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
    /// Validate the configuration and exit
    CheckConfig,
}
