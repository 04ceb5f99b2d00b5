//! Platform Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Token expired")]
    TokenExpired,

    #[error("User account no longer exists")]
    UserNotFound,

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Event has reached maximum capacity")]
    Full,

    #[error("Database deadline exceeded")]
    Timeout,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    pub fn invalid_field(message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![message.into()],
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidState { .. } | Self::Full => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials
            | Self::InvalidToken { .. }
            | Self::TokenExpired
            | Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Store and runtime failures are logged server-side; the client sees
        // only a generic message.
        let (message, errors) = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database failure");
                ("Internal server error".to_string(), None)
            }
            Self::Internal { message } => {
                tracing::error!(message = %message, "internal failure");
                ("Internal server error".to_string(), None)
            }
            Self::Validation { errors } => (self.to_string(), Some(errors.clone())),
            _ => (self.to_string(), None),
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
            "errors": errors,
        });

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
