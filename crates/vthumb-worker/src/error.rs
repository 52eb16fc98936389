//! Worker error types.

use std::time::Duration;

use thiserror::Error;

use vthumb_models::ModelError;
use vthumb_select::SelectError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Feature extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Persisting thumbnails failed: {0}")]
    PersistFailed(String),

    #[error("Run exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("Selection error: {0}")]
    Select(#[from] SelectError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn run_failed(msg: impl Into<String>) -> Self {
        Self::RunFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn persist_failed(msg: impl Into<String>) -> Self {
        Self::PersistFailed(msg.into())
    }

    /// No scoring profile accepted any frame: nothing to show, nothing broken.
    pub fn is_nothing_to_show(&self) -> bool {
        matches!(self, WorkerError::Select(SelectError::EmptyInput { .. }))
    }

    /// Check if the error comes from configuration rather than data.
    pub fn is_configuration(&self) -> bool {
        match self {
            WorkerError::ConfigError(_) => true,
            WorkerError::Select(e) => e.is_configuration(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_nothing_to_show() {
        let err = WorkerError::from(SelectError::EmptyInput { sources: 2 });
        assert!(err.is_nothing_to_show());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(WorkerError::config_error("missing path").is_configuration());
        assert!(WorkerError::from(SelectError::unknown_profile("x")).is_configuration());
        let timeout = WorkerError::Timeout(Duration::from_secs(5));
        assert!(!timeout.is_configuration());
        assert_eq!(timeout.to_string(), "Run exceeded deadline of 5s");
        assert_eq!(
            WorkerError::Timeout(Duration::from_millis(250)).to_string(),
            "Run exceeded deadline of 250ms"
        );
    }
}
