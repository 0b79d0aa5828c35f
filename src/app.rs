//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging and environment settings
//! - parses CLI arguments
//! - dispatches to the form, checker or printers

use std::path::PathBuf;

use clap::Parser;
use log::debug;

use crate::cli::{Command, ConfigArgs, DepsArgs, ShowArgs, TuiArgs};
use crate::domain::CalibrationKind;
use crate::error::AppError;
use crate::settings::Settings;

pub mod pipeline;

/// Entry point for the `tdsr` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // `tdsr` and `tdsr -c night.yml` behave like `tdsr tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    let settings = Settings::from_env()?;
    debug!("settings: {settings:?}");

    match cli.command {
        Command::Tui(args) => handle_tui(args, &settings),
        Command::Check(args) => handle_check(args, &settings),
        Command::Show(args) => handle_show(args, &settings),
        Command::Deps(args) => handle_deps(args),
    }
}

fn handle_tui(args: TuiArgs, settings: &Settings) -> Result<(), AppError> {
    let config = args.config.clone().or_else(|| settings.config_path.clone());
    let depth = args.depth.unwrap_or(settings.search_depth);
    crate::tui::run(config, args.root, depth)
}

fn handle_check(args: ConfigArgs, settings: &Settings) -> Result<(), AppError> {
    let path = config_path(&args, settings)?;
    let (_, problems) = pipeline::check_config(&path)?;
    print!("{}", crate::report::format_problems(&path, &problems));
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::new(3, format!("{} is not a valid config.", path.display())))
    }
}

fn handle_show(args: ShowArgs, settings: &Settings) -> Result<(), AppError> {
    let path = config_path(&args.file, settings)?;
    let doc = crate::io::read_config_yaml(&path)?;
    if args.json {
        println!("{}", crate::io::document_to_json(&doc)?);
    } else {
        print!("{}", crate::report::format_document_summary(&doc, &path));
    }
    Ok(())
}

fn handle_deps(args: DepsArgs) -> Result<(), AppError> {
    let text = match args.kind {
        Some(name) => {
            let kind = CalibrationKind::parse(&name)?;
            crate::report::format_dependency_row(kind)
        }
        None => crate::report::format_dependency_table(),
    };
    print!("{text}");
    Ok(())
}

fn config_path(args: &ConfigArgs, settings: &Settings) -> Result<PathBuf, AppError> {
    args.config
        .clone()
        .or_else(|| settings.config_path.clone())
        .ok_or_else(|| AppError::new(2, "No config given. Pass a YAML path or set TDSR_CONFIG."))
}

/// Rewrite argv so `tdsr` defaults to `tdsr tui`.
///
/// Rules:
/// - `tdsr`                      -> `tdsr tui`
/// - `tdsr -c night.yml ...`     -> `tdsr tui -c night.yml ...`
/// - `tdsr --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "check" | "show" | "deps");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
