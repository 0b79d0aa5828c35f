//! Shared load/save workflow used by both the CLI and the TUI.
//!
//! form -> flatten -> resolve save path -> write YAML
//! YAML -> read -> restore -> form

use std::path::{Path, PathBuf};

use log::info;

use crate::document::{Document, DocumentError, flatten, restore, validate};
use crate::domain::Form;
use crate::error::AppError;
use crate::io::{read_config_yaml, resolve_save_path, write_config_yaml};

/// Flatten the form and write it to its save path.
///
/// Returns the path actually written (after defaulting).
pub fn save_form(form: &Form) -> Result<PathBuf, AppError> {
    let doc = flatten(form)?;
    let path = resolve_save_path(form.save_path.as_deref());
    write_config_yaml(&path, &doc)?;
    Ok(path)
}

/// Read a config and rebuild the form from it.
///
/// The loaded path becomes the form's save path.
pub fn load_form(path: &Path) -> Result<Form, AppError> {
    let doc = read_config_yaml(path)?;
    let mut form = restore(&doc)?;
    form.save_path = Some(path.to_path_buf());
    info!("loaded {} step(s) from {}", doc.steps().count(), path.display());
    Ok(form)
}

/// Read a config and collect its consistency problems.
pub fn check_config(path: &Path) -> Result<(Document, Vec<DocumentError>), AppError> {
    let doc = read_config_yaml(path)?;
    let problems = validate(&doc);
    Ok((doc, problems))
}
