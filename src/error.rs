use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{auth::AuthError, storage::StorageError, validation::ValidationErrors};

/// AppError
///
/// Every failure a page request can end in. Each one is contained to the request that raised
/// it; nothing is retried.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("auth service error")]
    Auth(#[from] AuthError),

    #[error("storage error")]
    Storage(#[from] StorageError),
}

/// ErrorBody
///
/// JSON body for every error response. `fields` is only present for validation failures.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub fields: Option<ValidationErrors>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            // Credentials the auth service refused are the caller's problem, not ours.
            AppError::Auth(AuthError::Rejected { .. }) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Auth(_) | AppError::Storage(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Auth(AuthError::Rejected { .. }) => "AUTH_REJECTED",
            AppError::Database(_) | AppError::Auth(_) | AppError::Storage(_) => "BACKEND_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Backend details go to the log only; the page gets a short inline message.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "database call failed");
                "The event service is unavailable, please try again later.".to_string()
            }
            AppError::Storage(e) => {
                tracing::error!(error = ?e, "storage call failed");
                "File storage is unavailable, please try again later.".to_string()
            }
            AppError::Auth(AuthError::Rejected { message, .. }) => message.clone(),
            AppError::Auth(e) => {
                tracing::error!(error = ?e, "auth call failed");
                "The sign-in service is unavailable, please try again later.".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
            fields: match self {
                AppError::Validation(errors) => Some(errors),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
