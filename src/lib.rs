//! `tds-reduction` library crate.
//!
//! The binary (`tdsr`) is a thin wrapper around this library so that:
//!
//! - the form/document mapping is testable without a terminal
//! - the document model can be reused by other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod document;
pub mod domain;
pub mod error;
pub mod io;
pub mod report;
pub mod settings;
pub mod tui;
