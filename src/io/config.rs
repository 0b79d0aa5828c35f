//! Read/write the YAML job description.
//!
//! The file is a single flat document (see `crate::document`). A comment
//! header records which tool wrote it and when; readers ignore it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::cli::picker::with_default_extension;
use crate::document::Document;
use crate::error::AppError;

/// File written when no save path has been chosen.
pub const DEFAULT_CONFIG_NAME: &str = "last_config.yaml";

/// Extension appended to a chosen save path that has none.
pub const CONFIG_EXTENSION: &str = "yml";

/// Render the document as YAML text, header included.
pub fn render_config_yaml(doc: &Document) -> Result<String, AppError> {
    let body =
        serde_yaml::to_string(doc).map_err(|e| AppError::new(3, format!("Failed to serialize config: {e}")))?;
    Ok(format!(
        "# generated by tdsr {}\n{body}",
        Local::now().to_rfc3339()
    ))
}

/// Write the document to `path`.
pub fn write_config_yaml(path: &Path, doc: &Document) -> Result<(), AppError> {
    let text = render_config_yaml(doc)?;
    fs::write(path, text)
        .map_err(|e| AppError::new(2, format!("Failed to write config '{}': {e}", path.display())))?;
    info!("wrote config {}", path.display());
    Ok(())
}

/// Read a document from `path`.
pub fn read_config_yaml(path: &Path) -> Result<Document, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
    let doc = parse_config_yaml(&text)
        .map_err(|e| AppError::new(3, format!("Invalid config '{}': {e}", path.display())))?;
    info!("read config {}", path.display());
    Ok(doc)
}

/// Parse YAML text. An empty file is an empty document.
pub fn parse_config_yaml(text: &str) -> Result<Document, serde_yaml::Error> {
    if text.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
        return Ok(Document::default());
    }
    serde_yaml::from_str(text)
}

/// Pick the file to save to.
///
/// - no choice -> `last_config.yaml`
/// - a choice without extension -> `<choice>.yml`
pub fn resolve_save_path(chosen: Option<&Path>) -> PathBuf {
    match chosen {
        Some(path) if !path.as_os_str().is_empty() => with_default_extension(path, CONFIG_EXTENSION),
        _ => PathBuf::from(DEFAULT_CONFIG_NAME),
    }
}

/// Pretty JSON rendering, for scripting.
pub fn document_to_json(doc: &Document) -> Result<String, AppError> {
    serde_json::to_string_pretty(doc).map_err(|e| AppError::new(3, format!("Failed to serialize config: {e}")))
}
