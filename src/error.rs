//! Failure taxonomy of the account lifecycle and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email already exists.")]
    DuplicateEmail,
    #[error("Username already taken.")]
    UsernameTaken,
    #[error("Email not found.")]
    NotFound,
    /// Unknown username and wrong password both land here.
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Please confirm your email first.")]
    NotConfirmed,
    /// Expired and tampered links are indistinguishable to the caller.
    #[error("The link is invalid or has expired.")]
    ExpiredOrInvalidLink,
    #[error("Incorrect old password.")]
    IncorrectPassword,
    #[error("Authentication required.")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl AccountError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::DuplicateEmail => "duplicate_email",
            AccountError::UsernameTaken => "username_taken",
            AccountError::NotFound => "not_found",
            AccountError::InvalidCredentials => "invalid_credentials",
            AccountError::NotConfirmed => "not_confirmed",
            AccountError::ExpiredOrInvalidLink => "expired_or_invalid_link",
            AccountError::IncorrectPassword => "incorrect_password",
            AccountError::Unauthorized => "unauthorized",
            AccountError::Validation(_) => "validation",
            AccountError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::DuplicateEmail | AccountError::UsernameTaken => StatusCode::CONFLICT,
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::InvalidCredentials | AccountError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AccountError::NotConfirmed => StatusCode::FORBIDDEN,
            AccountError::ExpiredOrInvalidLink
            | AccountError::IncorrectPassword
            | AccountError::Validation(_) => StatusCode::BAD_REQUEST,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let message = match &self {
            AccountError::Internal(e) => {
                error!(error = ?e, "internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}
