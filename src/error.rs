//! # Error Handling
//!
//! Two error families live here:
//!
//! - [`AppError`]: HTTP-facing errors for the REST endpoints, converted to
//!   JSON responses through actix's `ResponseError` trait.
//! - [`EngineError`]: typed failures from the speech-recognition and
//!   summarization collaborators. These never terminate a connection: the
//!   session layer catches them and reports them as informational WebSocket
//!   events, leaving the session buffer and watermark untouched.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Application-level errors for HTTP request handlers.
///
/// ## HTTP Status Code Mapping:
/// - Internal/ConfigError → 500 (Internal Server Error)
/// - BadRequest/ValidationError → 400 (Bad Request)
/// - NotFound → 404 (Not Found)
/// - SessionLimit → 503 (Service Unavailable)
#[derive(Debug)]
pub enum AppError {
    /// Server-side failures (engine init, lock poisoning, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Concurrent session limit reached
    SessionLimit(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::SessionLimit(msg) => write!(f, "Session limit: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            AppError::SessionLimit(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "session_limit",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Typed failures from the recognition/summarization collaborators.
///
/// ## Recovery Contract:
/// Every variant is recoverable at the session boundary. On a transcription
/// failure the watermark is not advanced, so the failed window's audio stays
/// eligible for the next triggering append. Summarization failures leave the
/// transcript untouched.
#[derive(Debug)]
pub enum EngineError {
    /// Model download or initialization failed
    ModelLoad(String),

    /// Inference over a sample window or text chunk failed
    Inference(String),

    /// A collaborator was invoked with an empty input window
    EmptyInput,

    /// The call exceeded the configured deadline
    Timeout { seconds: u64 },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ModelLoad(msg) => write!(f, "model load failed: {}", msg),
            EngineError::Inference(msg) => write!(f, "inference failed: {}", msg),
            EngineError::EmptyInput => write!(f, "empty input"),
            EngineError::Timeout { seconds } => {
                write!(f, "call exceeded {}s deadline", seconds)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<candle_core::Error> for EngineError {
    fn from(err: candle_core::Error) -> Self {
        EngineError::Inference(err.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Shorthand for Results carrying an [`AppError`].
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::Timeout { seconds: 30 };
        assert_eq!(err.to_string(), "call exceeded 30s deadline");

        let err = EngineError::ModelLoad("missing tokenizer.json".to_string());
        assert!(err.to_string().contains("missing tokenizer.json"));
    }

    #[test]
    fn test_app_error_from_engine_error() {
        let err: AppError = EngineError::EmptyInput.into();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
