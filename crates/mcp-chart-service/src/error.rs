//! Error types for the chart service.

use std::path::PathBuf;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mcp_chart::McpError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request handling error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was missing fields or was not valid JSON.
    #[error("{0}")]
    BadRequest(String),

    /// The chart client failed.
    #[error(transparent)]
    Chart(#[from] McpError),
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::BadRequest(rejection.body_text())
    }
}

/// Result type for request handlers.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ServiceError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Chart(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ServiceError::Chart(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "chart request failed");
        } else {
            tracing::warn!(status = %status, error = %message, "rejected chart request");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Startup configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this service.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A resolved value is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
