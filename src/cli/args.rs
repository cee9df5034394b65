//! Command line argument parsing for the index-version CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// index-version - inspect version documents of a partition directory
#[derive(Parser, Debug, Clone)]
#[command(name = "index-version")]
#[command(about = "Inspect and validate index version documents")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct VersionArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Version configuration file (JSON)
    #[arg(long, value_name = "CONFIG_FILE", env = "INDEX_VERSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl VersionArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the versions of a partition directory
    List(ListArgs),

    /// Show one version document
    Show(ShowArgs),

    /// Decode and check every version document
    Validate(ValidateArgs),

    /// Check whether one version can fast-forward from another
    #[command(name = "fast-forward")]
    FastForward(FastForwardArgs),
}

/// Arguments for listing versions
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Partition directory holding version files
    #[arg(value_name = "DIR")]
    pub directory: PathBuf,
}

/// Arguments for showing a version
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Partition directory holding version files
    #[arg(value_name = "DIR")]
    pub directory: PathBuf,

    /// Version to show (default: latest)
    #[arg(long)]
    pub version_id: Option<i32>,
}

/// Arguments for validating versions
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Partition directory holding version files
    #[arg(value_name = "DIR")]
    pub directory: PathBuf,
}

/// Arguments for the fast-forward check
#[derive(Parser, Debug, Clone)]
pub struct FastForwardArgs {
    /// Partition directory holding version files
    #[arg(value_name = "DIR")]
    pub directory: PathBuf,

    /// Version currently held
    #[arg(long)]
    pub from: i32,

    /// Newly observed version
    #[arg(long)]
    pub to: i32,

    /// The holder has an unsealed building segment
    #[arg(long)]
    pub building: bool,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
