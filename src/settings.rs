//! Environment-driven defaults.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory:
//!
//! - `TDSR_CONFIG` default document path for load/save
//! - `TDSR_SEARCH_DEPTH` directory depth scanned by the file picker

use std::path::PathBuf;

use crate::cli::picker::DEFAULT_SEARCH_DEPTH;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub search_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: None,
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut settings = Self::default();

        if let Some(path) = lookup("TDSR_CONFIG").filter(|s| !s.trim().is_empty()) {
            settings.config_path = Some(PathBuf::from(path.trim()));
        }

        if let Some(depth) = lookup("TDSR_SEARCH_DEPTH") {
            settings.search_depth = depth.trim().parse().map_err(|e| {
                AppError::new(2, format!("Invalid TDSR_SEARCH_DEPTH '{depth}': {e}"))
            })?;
        }

        Ok(settings)
    }
}
