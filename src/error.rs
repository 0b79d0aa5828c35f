//! Binary-level error with a process exit code.
//!
//! Exit codes:
//! - `2` input or file-system problems
//! - `3` invalid form or document contents
//! - `4` terminal failures

use crate::document::DocumentError;
use crate::domain::FormError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        AppError::new(3, err.to_string())
    }
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        AppError::new(3, err.to_string())
    }
}
