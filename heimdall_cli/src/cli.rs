//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "heimdall", version, about = "Heimdall lane counter CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/heimdall.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Which histogram rendering to print.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum HistogramShape {
    /// One `D (cm), Counts` row per 10 cm bin
    Table,
    /// Horizontal bar chart scaled to the fullest bin
    Chart,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count lane departures until Ctrl-C (or a cycle bound)
    Count {
        /// Stop after this many processed cycles instead of running until Ctrl-C
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Append one `ms_since_start, distance_cm` CSV row per processed cycle
        #[arg(long, value_name = "FILE")]
        raw_log: Option<PathBuf>,
        /// Use the direct loop (no sampler); reads the sensor inside the detection loop
        #[arg(long, action = ArgAction::SetTrue)]
        direct: bool,
    },
    /// Sample for a bounded number of cycles, then print the distance histogram
    Histogram {
        /// Processed cycles to sample before rendering
        #[arg(long, value_name = "N", default_value_t = 500)]
        cycles: u64,
        /// Rendering to print
        #[arg(long, value_enum, value_name = "SHAPE", default_value = "chart")]
        shape: HistogramShape,
        /// Clip the chart at this distance; defaults to just past the farthest lane
        #[arg(long, value_name = "CM")]
        max_cm: Option<i32>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
