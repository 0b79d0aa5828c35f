//! Command-line parsing for the reduction config builder.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the form and document code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tdsr", version, about = "Reduction pipeline config builder")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Edit a config interactively in the terminal form.
    Tui(TuiArgs),
    /// Validate a config: dependency order, flag values and stale paths.
    Check(ConfigArgs),
    /// Print a readable summary of a config.
    Show(ShowArgs),
    /// Print the calibration kinds and what each may depend on.
    Deps(DepsArgs),
}

/// Options for the interactive form.
#[derive(Debug, Parser, Clone)]
pub struct TuiArgs {
    /// Config to load into the form on start (also the default save target).
    #[arg(short = 'c', long, value_name = "YAML")]
    pub config: Option<PathBuf>,

    /// Directory scanned by the file picker.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory depth scanned by the file picker (defaults to TDSR_SEARCH_DEPTH or 4).
    #[arg(long)]
    pub depth: Option<usize>,
}

/// A single config file.
#[derive(Debug, Parser, Clone)]
pub struct ConfigArgs {
    /// Config file (defaults to TDSR_CONFIG).
    #[arg(value_name = "YAML")]
    pub config: Option<PathBuf>,
}

/// Options for `show`.
#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub file: ConfigArgs,

    /// Print the document as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

/// Options for `deps`.
#[derive(Debug, Parser, Clone)]
pub struct DepsArgs {
    /// Only this kind, by code (`W`) or document key (`disp`).
    #[arg(value_name = "KIND")]
    pub kind: Option<String>,
}
