//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::Parser;
use std::path::PathBuf;

use crate::loader::CHECKS_PATH_ENV;
use crate::runner::IsolationMode;

/// diagrun - Pluggable diagnostic check runner.
#[derive(Debug, Parser)]
#[command(name = "diagrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON allow-list of check plugins to run
    #[arg(short, long, conflicts_with = "single_checker")]
    pub config: Option<PathBuf>,

    /// Run only the checks of this plugin file
    #[arg(short, long)]
    pub single_checker: Option<PathBuf>,

    /// Extra plugin files or directories, in platform path-list syntax
    #[arg(long, env = CHECKS_PATH_ENV, value_name = "PATHS")]
    pub checks_path: Option<String>,

    /// Only run checks with these tags or names (comma-separated, `all` for everything)
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// List the discovered checks instead of running them
    #[arg(short, long)]
    pub list: bool,

    /// Also save the result tree to a timestamped file in this directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// How to isolate checks: auto, process or none
    #[arg(long, default_value = "auto")]
    pub isolation: IsolationMode,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}
