//! Error types for the core library

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for gitdeb operations
#[derive(Error, Debug)]
pub enum Error {
    /// The user declined to delete an existing directory
    #[error("Aborted by user: refusing to delete {path:?}")]
    AbortedByUser { path: PathBuf },

    /// Exporting a repository tree failed
    #[error("Failed to export repository {repository:?}: {reason}")]
    ExportError {
        repository: PathBuf,
        reason: String,
        exit_code: Option<i32>,
    },

    /// A rewrite rule could not be applied
    #[error("Rewrite failed for {path:?}: {reason}")]
    RewriteError { path: PathBuf, reason: String },

    /// An external tool exited with a non-zero status
    #[error("{tool} exited with code {exit_code}")]
    ExternalToolFailure { tool: String, exit_code: i32 },

    /// An external tool could not be started
    #[error("Failed to run {tool}: {reason}")]
    ToolNotFound { tool: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for gitdeb operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an export error without an exit code
    pub fn export(repository: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExportError { repository: repository.into(), reason: reason.into(), exit_code: None }
    }

    /// Create a rewrite error
    pub fn rewrite(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RewriteError { path: path.into(), reason: reason.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    /// Process exit code the command line front end reports for this error.
    ///
    /// External tool exit codes pass through unchanged; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExternalToolFailure { exit_code, .. } => *exit_code,
            Self::ExportError { exit_code: Some(code), .. } => *code,
            _ => 1,
        }
    }

    /// Check if the run was stopped by the user
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::AbortedByUser { .. })
    }
}
