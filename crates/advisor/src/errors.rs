//! Error types for the advisor crate.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors raised while validating input or talking to an AI provider.
#[derive(Error, Debug, Clone)]
pub enum AdvisorError {
    // Input errors
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Invalid data URI: {reason}")]
    InvalidDataUri { reason: String },

    // AI errors
    #[error("AI error: {0}")]
    Ai(String),

    #[error("AI provider not configured: {provider}")]
    ProviderNotConfigured { provider: String },

    #[error("AI model not supported: {model}")]
    ModelNotSupported { model: String },

    #[error("AI response parse error: {reason}")]
    AiResponseParseError { reason: String },

    #[error("AI response does not match the expected schema: {reason}")]
    SchemaMismatch { reason: String },

    #[error("AI rate limit exceeded (429) from {provider}: {message}")]
    AiRateLimitExceeded { provider: String, message: String },

    // Prompt errors
    #[error("Prompt template error: {reason}")]
    Template { reason: String },

    #[error("Failed to parse JSON: {reason}")]
    JsonParseError { reason: String },
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParseError {
            reason: err.to_string(),
        }
    }
}

impl From<ValidationErrors> for AdvisorError {
    fn from(err: ValidationErrors) -> Self {
        Self::Validation(err)
    }
}

/// Result type alias for advisor operations
pub type AdvisorResult<T> = Result<T, AdvisorError>;
