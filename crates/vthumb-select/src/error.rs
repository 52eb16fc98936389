//! Error types for the selection core.

use thiserror::Error;
use vthumb_models::ModelError;

/// Result type for selection operations.
pub type SelectResult<T> = Result<T, SelectError>;

/// Errors raised by the selection core.
///
/// Classification and scoring never fail; missing values degrade to
/// defaults instead. Asking the selector for more thumbnails than exist is
/// not an error either: it returns fewer.
#[derive(Debug, Error)]
pub enum SelectError {
    /// Every source handed to the merger was empty.
    #[error("No candidates to merge: all {sources} source lists are empty")]
    EmptyInput { sources: usize },

    /// Malformed candidate or feature input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration that cannot be used as given.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A profile id that no configuration defines.
    #[error("Unknown scoring profile: {0}")]
    UnknownProfile(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl SelectError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unknown_profile(id: impl Into<String>) -> Self {
        Self::UnknownProfile(id.into())
    }

    /// True for input errors ("something is broken" with the data).
    pub fn is_input(&self) -> bool {
        matches!(self, Self::EmptyInput { .. } | Self::InvalidInput(_))
    }

    /// True for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnknownProfile(_) | Self::JsonParse(_)
        )
    }
}
