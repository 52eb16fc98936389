//! Error types for model parsing and validation.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or validating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Invalid frame features: {0}")]
    InvalidFeatures(String),

    #[error("Invalid experiment config: {0}")]
    InvalidExperiment(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an unknown-variant error.
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }

    /// Create an invalid features error.
    pub fn invalid_features(message: impl Into<String>) -> Self {
        Self::InvalidFeatures(message.into())
    }

    /// Create an invalid experiment error.
    pub fn invalid_experiment(message: impl Into<String>) -> Self {
        Self::InvalidExperiment(message.into())
    }
}
