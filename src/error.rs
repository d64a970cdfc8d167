// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Identity provider rejected the request: {0}")]
    ExternalAuth(String),

    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    #[error("Sheets API error: {0}")]
    SheetsApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::ExternalAuth(msg) => {
                tracing::warn!(error = %msg, "Identity provider rejected credentials");
                (StatusCode::UNAUTHORIZED, "external_auth_error", None)
            }
            AppError::ProfileFetch(msg) => (
                StatusCode::BAD_GATEWAY,
                "profile_fetch_error",
                Some(msg.clone()),
            ),
            AppError::SheetsApi(msg) => {
                (StatusCode::BAD_GATEWAY, "sheets_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
