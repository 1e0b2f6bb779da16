//! Error types for the AgriSmart service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use advisor::ValidationErrors;

/// Identity provider errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailExists,

    #[error("Authentication required")]
    MissingToken,

    #[error("Session is invalid or has expired")]
    InvalidToken,

    #[error("Too many attempts, try again later")]
    TooManyAttempts,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

/// Document store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid {kind} '{value}': only letters, digits, '-' and '_' are allowed")]
    InvalidPath { kind: &'static str, value: String },

    #[error("Record '{id}' not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Failed to parse stored data: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Deletion must be confirmed with confirm=true")]
    ConfirmationRequired,

    #[error("Unknown history collection '{0}'")]
    UnknownCollection(String),

    #[error("{0}")]
    BadRequest(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        Self::Validation(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(err) => match err {
                AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::EmailExists => StatusCode::CONFLICT,
                AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
                AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
                AuthError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(err) => match err {
                StoreError::InvalidPath { .. } | StoreError::InvalidDocument(_) => {
                    StatusCode::BAD_REQUEST
                }
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Read { .. } | StoreError::Write { .. } | StoreError::Json(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConfirmationRequired | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownCollection(_) => StatusCode::NOT_FOUND,
        }
    }

    fn fields(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) | Self::Auth(AuthError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = match self.fields() {
            Some(errors) => json!({ "error": self.to_string(), "fields": errors.fields() }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
