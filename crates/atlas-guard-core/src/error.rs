//! Error types for the guard engine
//!
//! Only configuration and usage mistakes surface as [`GuardError`]. Data-level
//! problems (missing or malformed artifacts, failing predicates) are turned
//! into verdict content and never abort a run.

use thiserror::Error;

/// Usage and configuration errors that abort a guard run before a verdict exists
#[derive(Error, Debug)]
pub enum GuardError {
    /// No guard with this name in the catalog or guard file
    #[error("Unknown guard: {0}")]
    UnknownGuard(String),

    /// A schema check refers to a kind the contract registry does not know
    #[error("Contract missing for artifact kind '{0}'")]
    ContractMissing(String),

    /// A guard definition is internally inconsistent
    #[error("Invalid guard definition '{guard}': {message}")]
    InvalidGuard { guard: String, message: String },

    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Definition file (guards or contracts) could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Serialization error while emitting a verdict
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl GuardError {
    /// Create an invalid guard error
    pub fn invalid_guard(guard: impl Into<String>, message: impl Into<String>) -> Self {
        GuardError::InvalidGuard {
            guard: guard.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        GuardError::InvalidInput(msg.into())
    }

    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        GuardError::ParseError(msg.into())
    }

    /// Usage errors map to exit code 2; everything else is an internal failure
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            GuardError::UnknownGuard(_)
                | GuardError::ContractMissing(_)
                | GuardError::InvalidGuard { .. }
                | GuardError::InvalidInput(_)
                | GuardError::ParseError(_)
        )
    }
}

impl From<std::io::Error> for GuardError {
    fn from(err: std::io::Error) -> Self {
        GuardError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for GuardError {
    fn from(err: serde_yaml::Error) -> Self {
        GuardError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(err: toml::de::Error) -> Self {
        GuardError::ParseError(format!("TOML error: {}", err))
    }
}

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Failure raised inside a single checker
///
/// The verdict builder catches these and records `ok=false` with
/// `details.error`, so one bad checker never aborts the whole verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    /// The artifact needed by the check was not loaded
    #[error("artifact '{kind}' unavailable: {reason}")]
    ArtifactUnavailable { kind: String, reason: String },

    /// A field the check reads is absent or has the wrong shape
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Any other predicate failure
    #[error("{0}")]
    Predicate(String),
}

/// Typed artifact access failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("field '{0}' is absent")]
    Absent(String),

    #[error("field '{pointer}' expected {expected}, found {found}")]
    WrongType {
        pointer: String,
        expected: &'static str,
        found: &'static str,
    },
}
