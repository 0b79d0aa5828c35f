//! File pickers.
//!
//! Two ways to choose files, matching the form's text fields:
//! - free text (`parse_file_list` / `parse_single_file`), comma separated
//! - a discovered list of FITS frames under a directory (`discover_fits_files`)
//!
//! Save targets get a default extension when the user leaves it off.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Default directory recursion depth for finding FITS files.
pub const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Extension appended to frame outputs chosen without one.
pub const FITS_EXTENSION: &str = "fits";

const FITS_EXTENSIONS: [&str; 2] = ["fits", "fts"];

/// Split a comma-separated list of paths. Blank entries are dropped.
pub fn parse_file_list(text: &str) -> Vec<PathBuf> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Single-file fields keep only the first entry.
pub fn parse_single_file(text: &str) -> Option<PathBuf> {
    parse_file_list(text).into_iter().next()
}

/// Render a list back into the text field format.
pub fn join_file_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append `.ext` when `path` has no extension.
pub fn with_default_extension(path: &Path, ext: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}

/// Validate the provided path points to an existing FITS file.
pub fn validate_fits_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("FITS file not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !is_fits(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .fits/.fts file (got: {})", path.display()),
        ));
    }

    Ok(path.to_path_buf())
}

/// Discover FITS files under `root` (deterministic order).
pub fn discover_fits_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_fits_files_inner(root, 0, max_depth, &mut out);
    out.sort_by(|a, b| pretty_path(a).cmp(&pretty_path(b)));
    out
}

fn find_fits_files_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if should_skip_dir(&path) {
                continue;
            }
            find_fits_files_inner(&path, depth + 1, max_depth, out);
            continue;
        }

        if file_type.is_file() && is_fits(&path) {
            out.push(path);
        }
    }
}

fn is_fits(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FITS_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
        == Some(true)
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

/// Path without a leading `./`, for display.
pub fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
