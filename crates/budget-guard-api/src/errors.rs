//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use budget_guard_core::PayloadError;
use tracing::warn;

/// Alert handler errors with HTTP status code mapping
///
/// Only a request body that is not a push envelope is reported back to the
/// sender. Everything that happens after the envelope decodes is logged and
/// acknowledged with `200 OK`, so the push subscription does not redeliver.
#[derive(Debug, thiserror::Error)]
pub enum AlertHandlerError {
    /// The request body is not a push envelope
    ///
    /// Maps to: `400 Bad Request` (permanent error, do not retry)
    #[error("Bad Request: {0}")]
    InvalidEnvelope(#[source] PayloadError),
}

impl IntoResponse for AlertHandlerError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidEnvelope(ref e) => {
                warn!(error = %e, "Error decoding push envelope");
                StatusCode::BAD_REQUEST
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}
