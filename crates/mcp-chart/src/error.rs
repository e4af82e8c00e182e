//! Error types for MCP chart client operations.

use thiserror::Error;

/// Result type for MCP chart client operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP chart client operations.
///
/// None of these are retried internally; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum McpError {
    /// No session token, or an operation was attempted outside the active state.
    #[error("session error: {0}")]
    Session(String),

    /// The notification stream could not be opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// A frame or response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The request was rejected locally before touching the network.
    #[error("validation error: {0}")]
    Validation(String),

    /// Server returned a JSON-RPC error envelope.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// The caller-specified deadline expired.
    #[error("timeout after {0:?} waiting for response")]
    Timeout(std::time::Duration),

    /// The call was cancelled through its cancellation token.
    #[error("call cancelled")]
    Cancelled,

    /// A result did not have the expected shape.
    #[error("unexpected result shape: {0}")]
    ResultShape(String),

    /// The tool ran but reported a failure.
    #[error("tool error: {0}")]
    ToolError(String),

    /// Server answered a request with a non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a session error.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an RPC error from a server error payload.
    pub fn rpc(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data,
        }
    }

    /// Create a result shape error.
    pub fn result_shape(msg: impl Into<String>) -> Self {
        Self::ResultShape(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a tool error.
    pub fn tool_error(msg: impl Into<String>) -> Self {
        Self::ToolError(msg.into())
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a session error.
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    /// Check if the server rejected the call with an RPC error.
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }

    /// Check if the caller's deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
