//! Error types for MCP client operations.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::RequestId;

/// Result type for MCP client operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to spawn the MCP server process.
    #[error("failed to spawn MCP server: {0}")]
    SpawnFailed(String),

    /// Network-level failure on the HTTP path.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC protocol violation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A wait is already registered for this request id.
    #[error("a wait is already registered for request id {id}")]
    DuplicateWait {
        /// The contested request id.
        id: RequestId,
    },

    /// No matching response arrived before the deadline.
    #[error("timed out after {timeout:?} waiting for response to request {id}")]
    Timeout {
        /// Id of the request that went unanswered.
        id: RequestId,
        /// The configured wait duration.
        timeout: Duration,
    },

    /// The underlying process or socket ended.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Why the connection ended.
        reason: String,
    },

    /// A session-bound operation was invoked before `initialize` completed.
    #[error("session not established: initialize must complete first")]
    SessionNotEstablished,

    /// Server returned a JSON-RPC error response.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// Tool execution reported an error.
    #[error("tool error: {0}")]
    ToolError(String),

    /// The client is not initialized yet.
    #[error("client not initialized - call initialize() first")]
    NotInitialized,
}

impl McpError {
    /// Create a spawn failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a connection-closed error.
    pub fn connection_closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    /// Create a server error from a JSON-RPC error object.
    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
            data,
        }
    }

    /// Create a tool error.
    pub fn tool_error(msg: impl Into<String>) -> Self {
        Self::ToolError(msg.into())
    }
}
