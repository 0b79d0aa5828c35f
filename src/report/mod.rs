//! Reporting utilities: document summaries and the dependency table.

pub mod format;

pub use format::*;
