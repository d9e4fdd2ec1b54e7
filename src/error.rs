//! Crate-wide error type.
//!
//! Every failure mode the pipeline can surface is a variant here, so callers
//! (CLI and HTTP layer alike) match on structure instead of string contents.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was missing or empty (no file, empty prompt,
    /// count out of range).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An embedding or generation provider was unreachable or rejected the
    /// request.
    #[error("{provider} provider error: {message}")]
    Provider { provider: String, message: String },

    /// The vector index could not be reached.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// A vector's length disagrees with the collection's configured
    /// dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The generation model's output could not be parsed as a JSON array.
    #[error("malformed generation output: {0}")]
    MalformedOutput(String),

    /// One or more generated records failed shape validation. The whole
    /// batch is rejected; `indices` names the offending elements.
    #[error("generation output failed validation: {message}")]
    SchemaValidation { message: String, indices: Vec<usize> },

    /// A remote call exceeded its deadline.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            secs,
        }
    }

    /// Machine-readable error code used in HTTP responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::Provider { .. } => "provider_error",
            Error::IndexUnavailable(_) => "index_unavailable",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::MalformedOutput(_) => "malformed_output",
            Error::SchemaValidation { .. } => "schema_validation",
            Error::Timeout { .. } => "timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Provider { .. } => StatusCode::BAD_GATEWAY,
            Error::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MalformedOutput(_) => StatusCode::BAD_GATEWAY,
            Error::SchemaValidation { .. } => StatusCode::BAD_GATEWAY,
            Error::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let mut detail = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Error::SchemaValidation { ref indices, .. } = self {
            detail["indices"] = json!(indices);
        }
        (self.status(), Json(json!({ "error": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::InvalidArgument("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::IndexUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::timeout("generation", 30).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            Error::provider("google", "503").status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = Error::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 768, got 384"
        );
    }
}
