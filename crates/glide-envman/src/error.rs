//! Error types for the environment manager.

use thiserror::Error;

/// Errors from environment lifecycle and dependency installation.
#[derive(Error, Debug)]
pub enum EnvError {
    /// No usable interpreter to create the environment with
    #[error("python3 is not installed or not on PATH")]
    PythonNotFound,

    /// `python -m venv` failed
    #[error("failed to create environment at {path}: {reason}")]
    CreateFailed { path: String, reason: String },

    /// Removing the environment directory failed
    #[error("failed to remove environment at {path}: {source}")]
    DestroyFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Environment exists but its interpreter is missing
    #[error("environment at {path} has no usable interpreter")]
    ActivateFailed { path: String },

    /// pip invocation failed
    #[error("pip failed: {0}")]
    PipFailed(String),

    /// pip did not finish within its budget
    #[error("pip timed out after {0} seconds")]
    PipTimeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnvError>;
