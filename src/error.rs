//! The enumerated error kinds this service can surface, collapsed into one
//! `AppError` so every HTTP handler and WS command handler converts through a single place.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden")]
    Forbidden,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("room full")]
    RoomFull,
    #[error("room already started")]
    RoomStarted,
    #[error("password required")]
    PasswordRequired,
    #[error("invalid password")]
    PasswordInvalid,
    #[error("backpressure")]
    Backpressure,
    #[error("replaced by another connection")]
    Replaced,
    #[error("timeout")]
    Timeout,
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("store unavailable")]
    StoreUnavailable,
    #[error("internal error")]
    Internal,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Forbidden => "FORBIDDEN",
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::RoomFull => "ROOM_FULL",
            AppError::RoomStarted => "ROOM_STARTED",
            AppError::PasswordRequired => "PASSWORD_REQUIRED",
            AppError::PasswordInvalid => "PASSWORD_INVALID",
            AppError::Backpressure => "BACKPRESSURE",
            AppError::Replaced => "REPLACED",
            AppError::Timeout => "TIMEOUT",
            AppError::ProtocolError(_) => "PROTOCOL_ERROR",
            AppError::StoreUnavailable => "STORE_UNAVAILABLE",
            AppError::Internal => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidArgument(_)
            | AppError::RoomFull
            | AppError::RoomStarted
            | AppError::PasswordRequired
            | AppError::PasswordInvalid
            | AppError::ProtocolError(_) => StatusCode::BAD_REQUEST,
            AppError::Backpressure | AppError::Replaced | AppError::Timeout => {
                StatusCode::BAD_REQUEST
            }
            AppError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(code = self.code(), "{}", self);
            }
            _ => {
                tracing::warn!(code = self.code(), "{}", self);
            }
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<crate::store::StoreError> for AppError {
    fn from(e: crate::store::StoreError) -> Self {
        tracing::error!("store error: {:#}", e.0);
        AppError::StoreUnavailable
    }
}
