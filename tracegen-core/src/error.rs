//! Error types for tracegen operations

use crate::trace::TraceState;

/// Result type for tracegen operations
pub type Result<T> = std::result::Result<T, TracegenError>;

/// Error types for the trace generation harness
#[derive(Debug, thiserror::Error)]
pub enum TracegenError {
    /// No scenario registered under the given id
    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    /// No corruption transform registered for the (mode, variant) pair
    #[error("Unknown injection: mode '{mode}', variant '{variant}'")]
    UnknownInjection {
        /// Requested failure mode
        mode: String,
        /// Requested variant
        variant: String,
    },

    /// User id must be a non-empty string
    #[error("User id must not be empty")]
    InvalidUserId,

    /// Model client error
    #[error("Model error: {0}")]
    Model(String),

    /// Execution graph error
    #[error("Graph error: {0}")]
    Graph(String),

    /// Graph execution failed; carries the partial trace for diagnostics
    #[error(transparent)]
    Run(#[from] RunFailure),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Export error
    #[error("Export error: {0}")]
    Export(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for TracegenError {
    fn from(s: String) -> Self {
        TracegenError::Other(s)
    }
}

impl From<&str> for TracegenError {
    fn from(s: &str) -> Self {
        TracegenError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for TracegenError {
    fn from(err: anyhow::Error) -> Self {
        TracegenError::Other(err.to_string())
    }
}

/// A failed graph execution.
///
/// Distinct from an intentional injected failure: a completed run carries a
/// `failure_label`, a failed run carries a `RunFailure` with the partial
/// trace (status `Failed`, `raw_output` preserved when the model call got
/// that far).
#[derive(Debug, thiserror::Error)]
#[error("Run {run_id} failed: {message}")]
pub struct RunFailure {
    /// Run id of the failed trace
    pub run_id: String,
    /// What went wrong
    pub message: String,
    /// Partial trace state for diagnostics
    pub trace: Box<TraceState>,
}

impl RunFailure {
    pub(crate) fn new(message: impl Into<String>, trace: TraceState) -> Self {
        Self {
            run_id: trace.run_id.clone(),
            message: message.into(),
            trace: Box::new(trace),
        }
    }
}
