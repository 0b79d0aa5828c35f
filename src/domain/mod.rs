//! Domain model for the reduction form.
//!
//! This module defines:
//!
//! - calibration kinds and their dependency graph (`CalibrationKind`)
//! - per-step user choices (`CalibrationChoice`, `ObjectFrames`)
//! - the complete form state (`Form`)

pub mod choice;
pub mod types;

pub use choice::*;
pub use types::*;

use thiserror::Error;

/// Errors raised while editing the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("unknown calibration code '{0}'")]
    UnknownCode(char),

    #[error("unknown calibration key '{0}'")]
    UnknownKey(String),

    #[error("{kind} cannot depend on {dependency}")]
    DependencyNotAllowed {
        kind: &'static str,
        dependency: CalibrationKind,
    },

    #[error("{0} does not take a reference exposure")]
    ReferenceNotAllowed(CalibrationKind),

    #[error("{0} is a flag and has no entry of its own")]
    NotConfigurable(CalibrationKind),
}
