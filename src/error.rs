// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use crate::models::Provider;
use crate::services::oauth::OAuthError;
use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("User not found")]
    UserNotFound,

    #[error("{0} not connected")]
    ProviderNotConnected(Provider),

    /// A provider API answered with an error status.
    #[error("Provider error ({status}): {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Provider request timed out")]
    ProviderTimeout,

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

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
        let (status, error, details) = match self {
            // Same body for both so callers cannot tell which check failed.
            AppError::Unauthenticated | AppError::InvalidSession => {
                (StatusCode::UNAUTHORIZED, "unauthorized".to_string(), None)
            }
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found".to_string(), None),
            AppError::ProviderNotConnected(provider) => (
                StatusCode::FORBIDDEN,
                format!("{}_not_connected", provider),
                None,
            ),
            AppError::Upstream { status, message } => (status, message, None),
            AppError::ProviderTimeout => {
                (StatusCode::GATEWAY_TIMEOUT, "provider_timeout".to_string(), None)
            }
            AppError::ProviderUnavailable(msg) => {
                tracing::warn!(error = %msg, "Provider unavailable");
                (StatusCode::BAD_GATEWAY, "provider_unavailable".to_string(), None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request".to_string(), Some(msg))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error".to_string(), None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error".to_string(), None)
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        let message = err.to_string();
        match err {
            OAuthError::ProviderTimeout => AppError::ProviderTimeout,
            OAuthError::ProviderUnavailable(msg) => AppError::ProviderUnavailable(msg),
            OAuthError::TokenExchangeFailed { status } | OAuthError::UserInfoFailed { status } => {
                AppError::Upstream {
                    status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    message,
                }
            }
            OAuthError::InvalidResponse(msg) => AppError::ProviderUnavailable(msg),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
