use thiserror::Error;

use crate::form::ValidationErrors;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortalError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission(message.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Human-readable text for a banner, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(errors) => errors.to_string(),
            Self::Submission(msg)
            | Self::Fetch(msg)
            | Self::UnknownCategory(msg)
            | Self::Schema(msg)
            | Self::Config(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}
