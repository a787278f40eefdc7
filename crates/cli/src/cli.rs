//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use observability::LogMask;
use std::path::PathBuf;

/// SDM Sync - synchronized acoustic modem recordings
#[derive(Parser, Debug)]
#[command(
    name = "sdm-sync",
    author,
    version,
    about = "Synchronized receive rounds and two-way ranging for acoustic modems",
    long_about = "Drives one active and several passive acoustic modems through \n\
                  synchronized receive rounds, stores the captured streams and \n\
                  device counters, and estimates distances from the counters."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SDM_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SDM_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Scenario log categories, e.g. "note|info" or "0x1f"
    #[arg(
        long,
        default_value = "fatal|err|warn|note",
        global = true,
        env = "SDM_SYNC_LOG_MASK"
    )]
    pub log_mask: LogMask,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run synchronization rounds
    Run(RunArgs),

    /// Estimate the distance between two devices
    Distance(DistanceArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "sync.toml", env = "SDM_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Use the simulated medium, deriving devices from the sessions when none are configured
    #[arg(long)]
    pub simulate: bool,

    /// Override the number of rounds
    #[arg(long, env = "SDM_SYNC_ROUNDS")]
    pub rounds: Option<u32>,

    /// Override the output root directory
    #[arg(long, env = "SDM_SYNC_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the per-reply timeout in milliseconds
    #[arg(long, env = "SDM_SYNC_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SDM_SYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `distance` command
#[derive(Parser, Debug, Clone)]
pub struct DistanceArgs {
    /// Ranging record written by an earlier `distance --save`
    #[arg(long, value_name = "PATH")]
    pub measurement: Option<PathBuf>,

    /// Run a two-way exchange on the simulated medium instead
    #[arg(long, conflicts_with = "measurement")]
    pub simulate: bool,

    /// Write the exchange's ranging record to this file
    #[arg(long, value_name = "PATH", conflicts_with = "measurement")]
    pub save: Option<PathBuf>,

    /// Configuration file for the simulated exchange
    #[arg(short, long, default_value = "sync.toml", env = "SDM_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Sound speed in m/s (water ~1450, air ~340)
    #[arg(long, default_value = "1450")]
    pub sound_speed: f64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "sync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "sync.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show modem parameters
    #[arg(long)]
    pub modem: bool,

    /// Show record sink configuration
    #[arg(long)]
    pub records: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
