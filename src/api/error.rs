use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AccountError, AuthError, DigestError, StatsError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError(String),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    /// The blob repository could not be reached.
    StoreUnavailable(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::StoreUnavailable(msg) => write!(f, "Store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::StoreUnavailable(msg) => {
                tracing::warn!("Storage unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage is temporarily unavailable, please retry".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            AuthError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Forbidden => Self::forbidden(),
            AccountError::Validation(msg) => Self::ValidationError(msg),
            AccountError::NotFound(username) => Self::not_found("Account", username),
            AccountError::Conflict(msg) | AccountError::Guard(msg) => Self::Conflict(msg),
            AccountError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            AccountError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<DigestError> for ApiError {
    fn from(err: DigestError) -> Self {
        match err {
            DigestError::Forbidden => Self::forbidden(),
            DigestError::NotFound(date) => Self::not_found("Digest for", date),
            DigestError::Conflict(date) => {
                Self::Conflict(format!("A digest for {date} already exists"))
            }
            DigestError::Validation(msg) => Self::ValidationError(msg),
            DigestError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::Forbidden => Self::forbidden(),
            StatsError::Validation(msg) => Self::ValidationError(msg),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::Forbidden("Administrator rights required".to_string())
    }
}
