//! CLI argument definitions for tracegrid.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Tracegrid matrix runner.
///
/// Expands the declared server-variant × application matrix, runs every
/// combination against the instrumented runtimes, and reports per-case
/// results.
#[derive(Parser, Debug)]
#[command(name = "tracegrid")]
#[command(version, about, long_about = None)]
pub struct RunCli {
    /// Path to tracegrid.toml configuration file.
    #[arg(short, long, default_value = "tracegrid.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without running the matrix.
    #[arg(long)]
    pub validate: bool,

    /// Run only the named variants (repeatable).
    #[arg(long = "variant")]
    pub variants: Vec<String>,

    /// Run only the named applications (repeatable).
    #[arg(long = "application")]
    pub applications: Vec<String>,

    /// Write the full report as JSON to this path.
    #[arg(long)]
    pub report_json: Option<PathBuf>,
}
