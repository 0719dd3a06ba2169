//! Unified Error Handling System
//!
//! Error taxonomy for the storage gateway, using thiserror for all
//! components. Every variant carries enough context to be logged usefully
//! and mapped to an HTTP status by the axum layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::trace::TraceId;

/// Main error type for all gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("validation failed [{rule}]: {message}")]
    Validation { rule: &'static str, message: String },

    #[error("authentication required")]
    AuthRequired,

    #[error("identity mismatch: request claims {claimed} but authenticated as {actual}")]
    IdentityMismatch { claimed: String, actual: String },

    #[error("file not found: {file_id}")]
    NotFound { file_id: String },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("conflicting concurrent modification on {file_id}")]
    Conflict { file_id: String },

    #[error("storage adapter I/O error: {message}")]
    AdapterIo {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("upload failed: {message}")]
    UploadFailed { message: String },

    #[error("operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error category for grouping related errors, matching spec §7 kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Auth,
    NotFound,
    PermissionDenied,
    Conflict,
    AdapterIo,
    Timeout,
    Internal,
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Validation { .. } => ErrorCategory::Validation,
            GatewayError::AuthRequired | GatewayError::IdentityMismatch { .. } => {
                ErrorCategory::Auth
            }
            GatewayError::NotFound { .. } => ErrorCategory::NotFound,
            GatewayError::PermissionDenied { .. } => ErrorCategory::PermissionDenied,
            GatewayError::Conflict { .. } => ErrorCategory::Conflict,
            GatewayError::AdapterIo { .. } | GatewayError::UploadFailed { .. } => {
                ErrorCategory::AdapterIo
            }
            GatewayError::Timeout { .. } => ErrorCategory::Timeout,
            GatewayError::Database(_) | GatewayError::Internal(_) => ErrorCategory::Internal,
        }
    }

    fn status(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Auth => StatusCode::UNAUTHORIZED,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::AdapterIo => StatusCode::BAD_GATEWAY,
            ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Pair this error with the trace id of the request that produced it,
    /// for rendering over HTTP.
    pub fn with_trace(self, trace_id: TraceId) -> TracedError {
        TracedError {
            error: self,
            trace_id,
        }
    }
}

/// A `GatewayError` together with the `traceId` of the request that produced
/// it. This is the type the HTTP layer actually turns into a response.
#[derive(Debug)]
pub struct TracedError {
    pub error: GatewayError,
    pub trace_id: TraceId,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorBodyInner,
}

#[derive(Serialize)]
struct ErrorBodyInner {
    kind: &'static str,
    message: String,
    #[serde(rename = "traceId")]
    trace_id: String,
}

impl IntoResponse for TracedError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let kind = match self.error.category() {
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Auth => "AUTH",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::PermissionDenied => "PERMISSION_DENIED",
            ErrorCategory::Conflict => "CONFLICT",
            ErrorCategory::AdapterIo => "ADAPTER_IO",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::Internal => "INTERNAL",
        };
        let body = ErrorBody {
            error: ErrorBodyInner {
                kind,
                message: self.error.to_string(),
                trace_id: self.trace_id.to_string(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Error context trait for adding additional context to I/O errors at the
/// adapter boundary, mirroring the teacher's `ErrorContext` extension trait.
pub trait ErrorContext<T> {
    fn adapter_context(self, path: Option<PathBuf>) -> GatewayResult<T>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn adapter_context(self, path: Option<PathBuf>) -> GatewayResult<T> {
        self.map_err(|e| GatewayError::AdapterIo {
            message: e.to_string(),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_expected_status() {
        assert_eq!(
            GatewayError::Validation {
                rule: "EMPTY_FILE",
                message: "empty".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::NotFound {
                file_id: "f1".into()
            }
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Timeout { elapsed_ms: 10 }.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn adapter_context_wraps_io_error() {
        let io_err: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "nope"));
        let wrapped = io_err.adapter_context(Some(PathBuf::from("/tmp/x")));
        assert!(matches!(wrapped, Err(GatewayError::AdapterIo { .. })));
    }
}
