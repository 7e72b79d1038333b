//! Centralized error types for the fan-out core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the fan-out server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum FanoutError {
    /// Requested stream ID does not exist.
    #[error("stream not found: {0}")]
    NotFound(String),

    /// A create call named a `stream_id` that is already registered.
    #[error("stream already exists: {0}")]
    AlreadyExists(String),

    /// Stream exists but has no live transcoder at the moment of the call.
    #[error("stream is not running: {0}")]
    NotRunning(String),

    /// A safe stop was rejected because consumers are still attached.
    #[error("stream has {1} attached client(s): {0}")]
    ConsumerBusy(String, usize),

    /// The transcoder subprocess failed to start, died, or produced a short read.
    #[error("transcoder error for {0}: {1}")]
    TranscoderError(String, String),

    /// Client sent an invalid or malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error not attributable to a single stream.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for FanoutError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::NotRunning(_) => "not_running",
            Self::ConsumerBusy(_, _) => "consumer_busy",
            Self::TranscoderError(_, _) => "transcoder_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl FanoutError {
    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotRunning(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConsumerBusy(_, _) => StatusCode::CONFLICT,
            Self::TranscoderError(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for core operations.
pub type FanoutResult<T> = Result<T, FanoutError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

/// JSON response body for the safe-stop conflict case, which additionally
/// reports how many clients are still attached.
#[derive(Serialize)]
struct ConsumerBusyResponse {
    error: &'static str,
    message: String,
    status: u16,
    client_count: usize,
}

impl IntoResponse for FanoutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::ConsumerBusy(_, client_count) = self {
            let body = ConsumerBusyResponse {
                error: self.code(),
                message: self.to_string(),
                status: status.as_u16(),
                client_count,
            };
            return (status, Json(body)).into_response();
        }

        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_returns_404() {
        let err = FanoutError::NotFound("cam1".into());
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn consumer_busy_returns_409() {
        let err = FanoutError::ConsumerBusy("cam1".into(), 2);
        assert_eq!(err.code(), "consumer_busy");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_running_returns_503() {
        let err = FanoutError::NotRunning("cam1".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
