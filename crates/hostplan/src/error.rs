//! Error types for the hostplan crate

use thiserror::Error;

/// Errors that can occur while loading, compiling, or materializing a host plan
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is malformed or a prerequisite is missing
    #[error("invalid configuration: {field}: {message}")]
    Validation { field: String, message: String },

    /// A declaration references an id that was never declared
    #[error("unresolved reference: {from} refers to unknown resource {to}")]
    UnresolvedReference { from: String, to: String },

    /// Two declarations share the same id
    #[error("duplicate resource id: {0}")]
    DuplicateId(String),

    /// Ordering edges form a cycle
    #[error("dependency cycle involving {0}")]
    DependencyCycle(String),

    /// The one-shot setup step did not complete
    #[error("setup failed for {failed} resource(s): {details}")]
    SetupExecution { failed: usize, details: String },

    /// Configuration text could not be parsed
    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Setup manifest could not be encoded or decoded
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a validation error for a named configuration field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised before any resource could be produced
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::UnresolvedReference { .. }
                | Self::DuplicateId(_)
                | Self::DependencyCycle(_)
                | Self::Parse(_)
        )
    }
}

/// Result type for hostplan operations
pub type Result<T> = std::result::Result<T, Error>;
