//! Error types for probe execution.

use thiserror::Error;

/// Errors a probe can surface while inspecting the host environment.
///
/// Every variant is caught at the check boundary and converted into a
/// failing [`crate::CheckOutcome`]; probe errors never escape the pipeline.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// External call did not finish within its budget
    #[error("probe timed out")]
    Timeout,

    /// Spawning an external program failed
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A file, executable, or variable the check requires is absent
    #[error("{0} not found")]
    Missing(String),

    /// Resource is present but malformed
    #[error("{path}: {reason}")]
    Validation { path: String, reason: String },

    /// Interpreter could not import a required module
    #[error("import of {module} failed: {reason}")]
    Import { module: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_stable() {
        // The pipeline records this text verbatim in failing outcomes.
        assert_eq!(ProbeError::Timeout.to_string(), "probe timed out");
    }

    #[test]
    fn missing_names_the_resource() {
        let err = ProbeError::Missing("sumo".to_string());
        assert_eq!(err.to_string(), "sumo not found");
    }
}
