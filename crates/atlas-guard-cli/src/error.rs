//! Error types for the guard CLI

use atlas_guard_core::GuardError;
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Error, Debug)]
pub enum CliError {
    /// Engine error (unknown guard, contract missing, bad definition file, ...)
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Writing to stdout failed
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// Serializing a listing or rendering failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Usage errors exit with 2 and never produce a verdict
    pub fn is_usage_error(&self) -> bool {
        match self {
            CliError::Guard(err) => err.is_usage_error(),
            CliError::Output(_) | CliError::Serialization(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_classification() {
        let usage: CliError = GuardError::UnknownGuard("x".to_string()).into();
        assert!(usage.is_usage_error());
        assert_eq!(usage.to_string(), "Unknown guard: x");

        let io: CliError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into();
        assert!(!io.is_usage_error());
    }
}
