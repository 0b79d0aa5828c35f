//! Input/output helpers.
//!
//! - YAML job description read/write (`config`)

pub mod config;

pub use config::*;
