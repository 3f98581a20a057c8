//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use feeder_core::PeelDirection;
use feeder_core::tuning::{DEFAULT_MOVES, DEFAULT_PASSES};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Deadline used for the current move (for JSON error details).
pub static LAST_DEADLINE_MS: OnceLock<u64> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Tape feeder CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/feeder_config.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PeelArg {
    Forward,
    Reverse,
    Stop,
}

impl From<PeelArg> for PeelDirection {
    fn from(p: PeelArg) -> Self {
        match p {
            PeelArg::Forward => PeelDirection::Forward,
            PeelArg::Reverse => PeelDirection::Reverse,
            PeelArg::Stop => PeelDirection::Stopped,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move the tape to an absolute encoder position
    Move {
        /// Target position in encoder ticks
        #[arg(long, allow_hyphen_values = true)]
        to: i64,
        /// Override the move deadline in ms (takes precedence over config)
        #[arg(long, value_name = "MS")]
        deadline_ms: Option<u64>,
    },
    /// Feed the tape by a length in tenths of a millimetre (negative feeds back)
    Feed {
        /// Feed length in 0.1 mm units
        #[arg(long, allow_hyphen_values = true)]
        tenths: i64,
        /// Override the move deadline in ms (takes precedence over config)
        #[arg(long, value_name = "MS")]
        deadline_ms: Option<u64>,
    },
    /// Run the peel motor by hand
    Peel {
        #[arg(long, value_enum)]
        direction: PeelArg,
        /// Run time in ms; defaults to servo.peel_run_ms
        #[arg(long, value_name = "MS")]
        ms: Option<u32>,
        /// Speed in percent; defaults to servo.peel_speed
        #[arg(long, value_name = "PERCENT")]
        speed: Option<f32>,
    },
    /// Repeat a list of relative moves and summarize how each settles
    Profile {
        /// Relative moves in ticks, comma separated
        #[arg(
            long,
            value_delimiter = ',',
            allow_hyphen_values = true,
            default_values_t = DEFAULT_MOVES
        )]
        moves: Vec<i64>,
        /// Passes through the move list per round
        #[arg(long, default_value_t = DEFAULT_PASSES, value_parser = clap::value_parser!(u32).range(1..))]
        runs: u32,
        /// Rounds; each round after the first uses the gains suggested by the one before
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        rounds: u32,
        /// Keep peel coordination on during the moves
        #[arg(long, action = ArgAction::SetTrue)]
        peel: bool,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
