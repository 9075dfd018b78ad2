//! Boundary error type and JSON error responses.
//!
//! Every failure that leaves the crate carries a stable machine-readable
//! code. The same `ChannelError` is returned by in-process channel calls and
//! rendered as the HTTP error body.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use vens_reminder::ReminderError;

/// Error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArguments,
    SchedulingFailed,
    NotFound,
    UnknownAction,
    InvalidTransition,
    NotImplemented,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArguments => "INVALID_ARGUMENTS",
            ErrorCode::SchedulingFailed => "SCHEDULING_FAILED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::UnknownAction => "UNKNOWN_ACTION",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidArguments => StatusCode::BAD_REQUEST,
            ErrorCode::SchedulingFailed => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UnknownAction => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InvalidTransition => StatusCode::CONFLICT,
            ErrorCode::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed channel call or HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ChannelError {
    /// Machine-readable error code (e.g. "INVALID_ARGUMENTS").
    #[serde(rename = "error")]
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl ChannelError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArguments, message)
    }
}

impl From<ReminderError> for ChannelError {
    fn from(err: ReminderError) -> Self {
        let code = match &err {
            ReminderError::SchedulingFailed { .. } => ErrorCode::SchedulingFailed,
            ReminderError::NotFound(_) => ErrorCode::NotFound,
            ReminderError::UnknownAction { .. } => ErrorCode::UnknownAction,
            ReminderError::InvalidTransition { .. } | ReminderError::StillActive(_) => {
                ErrorCode::InvalidTransition
            }
            ReminderError::InvalidSchedule(_) => ErrorCode::InvalidArguments,
            ReminderError::UnknownCategory(_)
            | ReminderError::BackgroundTask(_)
            | ReminderError::Store(_) => ErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl IntoResponse for ChannelError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}
