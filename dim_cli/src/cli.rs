//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Env var that stops the simulated camera from producing depth frames.
pub const SIM_TIMEOUT_ENV: &str = "DIM_TEST_SIM_TIMEOUT";

#[derive(Parser, Debug)]
#[command(name = "dimensioner", version, about = "Parcel dimensioning station CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/dimensioner.toml")]
    pub config: PathBuf,

    /// Replay per-sample estimates from a CSV instead of measuring the scene
    #[arg(long, value_name = "FILE")]
    pub samples: Option<PathBuf>,

    /// Print results and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure the object currently in the work area
    Measure {
        /// Barcode of the parcel; required unless disabled in the config
        #[arg(long, default_value = "")]
        barcode: String,
        /// Number of units on the pallet
        #[arg(long, default_value_t = 1)]
        units: u32,
        /// Free-text comment stored with the result
        #[arg(long, default_value = "")]
        comment: String,
        /// Override the simulated scale reading, in grams
        #[arg(long = "weight-gr", value_name = "GRAMS")]
        weight_gr: Option<f64>,
    },
    /// Measure the empty floor and print its depth
    FloorDepth,
    /// Quick health check (config valid, camera delivering frames)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
