// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::services::oauth::AuthorizationErrorCode;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Path the frontend sends the user to when a Netatmo authorization is needed.
pub const AUTHORIZE_PATH: &str = "/auth/netatmo";

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Netatmo authorization denied: {code}")]
    AuthorizationDenied { code: String },

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Cannot refresh Netatmo access token because the refresh token does not exist")]
    MissingRefreshToken,

    #[error("Netatmo authorization required")]
    AuthorizationRequired,

    #[error("Netatmo request failed: {0}")]
    NetworkFailure(String),

    #[error("Netatmo request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Failed to read user data: {0}")]
    StoreReadFailure(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker embedded in `NetworkFailure` when Netatmo rejects the token.
    pub const NETATMO_TOKEN_ERROR: &'static str = "Netatmo token rejected";
    /// Marker embedded in `NetworkFailure` on HTTP 429.
    pub const NETATMO_RATE_LIMIT: &'static str = "Netatmo rate limit exceeded";

    /// Whether Netatmo refused the access or refresh token.
    pub fn is_token_error(&self) -> bool {
        match self {
            AppError::NetworkFailure(msg) => {
                msg.contains(Self::NETATMO_TOKEN_ERROR) || msg.contains("invalid_grant")
            }
            AppError::MissingRefreshToken => true,
            _ => false,
        }
    }

    /// Timeouts may be retried; everything else is surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::UpstreamTimeout(_))
    }

    /// User-facing text for an authorization denial, if the code is known.
    pub fn authorization_message(&self) -> Option<&'static str> {
        match self {
            AppError::AuthorizationDenied { code } => {
                AuthorizationErrorCode::from_code(code).map(|c| c.message())
            }
            _ => None,
        }
    }

    /// Map a reqwest transport error, keeping timeouts distinguishable.
    pub fn from_transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamTimeout(format!("{}: {}", context, err))
        } else {
            AppError::NetworkFailure(format!("{}: {}", context, err))
        }
    }
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
            AppError::AuthorizationDenied { code } => {
                tracing::warn!(code = %code, "Netatmo authorization denied");
                (
                    StatusCode::BAD_REQUEST,
                    "authorization_denied",
                    self.authorization_message().map(str::to_string),
                )
            }
            AppError::StateMismatch => {
                tracing::warn!("OAuth state mismatch, possible CSRF or replay");
                (StatusCode::BAD_REQUEST, "state_mismatch", None)
            }
            AppError::MissingRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "missing_refresh_token",
                Some(AUTHORIZE_PATH.to_string()),
            ),
            AppError::AuthorizationRequired => (
                StatusCode::UNAUTHORIZED,
                "authorization_required",
                Some(AUTHORIZE_PATH.to_string()),
            ),
            AppError::NetworkFailure(msg) => {
                (StatusCode::BAD_GATEWAY, "network_failure", Some(msg.clone()))
            }
            AppError::UpstreamTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_timeout",
                Some(msg.clone()),
            ),
            AppError::StoreReadFailure(msg) => {
                tracing::error!(error = %msg, "User data read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "store_read_failure", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
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
