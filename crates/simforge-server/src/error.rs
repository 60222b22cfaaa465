// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP error rendering.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use simforge_engine::ErrorCode;

/// Application-level error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An engine error.
    #[error(transparent)]
    Engine(#[from] simforge_engine::Error),

    /// A request the engine never saw was malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The multipart body could not be read.
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// The request is not a multipart form.
    #[error(transparent)]
    NotMultipart(#[from] MultipartRejection),

    /// The JSON body could not be parsed.
    #[error(transparent)]
    Json(#[from] JsonRejection),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for a stable error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict | ErrorCode::NotReady => StatusCode::CONFLICT,
        ErrorCode::InvalidType | ErrorCode::InvalidFormat | ErrorCode::InvalidRequest => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::ClusterError => StatusCode::BAD_GATEWAY,
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::ConfigError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Engine(err) => {
                let code = err.code();
                let status = status_for(code);
                if status.is_server_error() {
                    tracing::error!(code = %code, error = %err, "Request failed");
                }
                let message = match code {
                    ErrorCode::InternalError => "An internal error occurred".to_string(),
                    _ => err.to_string(),
                };
                (status, code, message)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest, msg.clone())
            }
            AppError::Multipart(err) => (err.status(), ErrorCode::InvalidRequest, err.body_text()),
            AppError::NotMultipart(rejection) => (
                rejection.status(),
                ErrorCode::InvalidRequest,
                rejection.body_text(),
            ),
            AppError::Json(rejection) => (
                rejection.status(),
                ErrorCode::InvalidRequest,
                rejection.body_text(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
