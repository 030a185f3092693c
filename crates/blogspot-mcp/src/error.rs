//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// JSON-RPC 2.0 error codes.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Errors raised by registries and the dispatcher.
///
/// Every variant maps onto a JSON-RPC error code via [`McpError::code`].
#[derive(Debug, Error)]
pub enum McpError {
    /// Input failed validation; the message names the offending field(s).
    #[error("{0}")]
    Validation(String),

    /// No registered operation under this name or URI.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// An operation with this name is already registered.
    #[error("{kind} '{name}' is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    /// Malformed request envelope.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown JSON-RPC method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// A handler failed; the message carries the original failure.
    #[error("{0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_registered(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyRegistered {
            kind,
            name: name.into(),
        }
    }

    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            McpError::Validation(_) => codes::INVALID_PARAMS,
            McpError::NotFound { .. }
            | McpError::AlreadyRegistered { .. }
            | McpError::InvalidRequest(_) => codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            McpError::Json(_) => codes::PARSE_ERROR,
            McpError::Internal(_) | McpError::Io(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Convert into a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                McpError::validation("Required argument 'topic' is missing"),
                "Required argument 'topic' is missing",
            ),
            (
                McpError::not_found("Tool", "blog-post"),
                "Tool 'blog-post' not found",
            ),
            (
                McpError::already_registered("Prompt", "draft"),
                "Prompt 'draft' is already registered",
            ),
            (
                McpError::MethodNotFound("foo/bar".to_string()),
                "Method not found: foo/bar",
            ),
            (
                McpError::internal("Tool execution failed: boom"),
                "Tool execution failed: boom",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(McpError::validation("x").code(), -32602);
        assert_eq!(McpError::not_found("Tool", "x").code(), -32600);
        assert_eq!(McpError::already_registered("Tool", "x").code(), -32600);
        assert_eq!(McpError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(McpError::internal("x").code(), -32603);
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let mcp_err: McpError = json_err.into();
        assert!(mcp_err.to_string().contains("JSON error"));
        assert_eq!(mcp_err.code(), codes::PARSE_ERROR);
    }

    #[test]
    fn test_to_rpc_error() {
        let rpc = McpError::not_found("Resource", "blogger://posts/1").to_rpc_error();
        assert_eq!(rpc.code, codes::INVALID_REQUEST);
        assert_eq!(rpc.message, "Resource 'blogger://posts/1' not found");
        assert!(rpc.data.is_none());
    }
}
