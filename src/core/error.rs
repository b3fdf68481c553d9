/// Typed error taxonomy for the MCP runtime.
///
/// Every error that can reach the JSON-RPC Dispatcher is a variant of
/// `McpError`. The dispatcher never pattern-matches on strings: each
/// variant knows its own JSON-RPC error code and HTTP status, so the two
/// mappings can never drift apart (see `rpc_code` / `http_status`).

use actix_web::http::StatusCode;
use thiserror::Error;

/// Application-range JSON-RPC error codes (outside the -32768..-32000
/// reserved band used by the protocol errors below).
mod app_codes {
    pub const TOOL_NOT_FOUND: i32 = -31000;
    pub const TOOL_TIMEOUT: i32 = -31001;
    pub const PARAMETER_VALIDATION: i32 = -31002;
    pub const TOOL_EXECUTION: i32 = -31003;
}

#[derive(Error, Debug, Clone)]
pub enum McpError {
    /// Malformed JSON in the request body.
    #[error("parse error: {message}")]
    ParseError { message: String },

    /// Request does not conform to the JSON-RPC 2.0 envelope (bad
    /// `jsonrpc` field, empty `method`, missing `id` on a non-notification).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The `method` named in the request has no handler.
    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    /// `params` could not be interpreted for the given method.
    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    /// An unexpected internal failure (should be rare; always logged).
    #[error("internal error: {message}")]
    InternalError { message: String },

    /// `tools/call` named a tool that is not registered (or disabled).
    #[error("tool not found: {tool_name}")]
    ToolNotFound { tool_name: String },

    /// The tool's handler did not complete within its configured timeout.
    #[error("tool '{tool_name}' timed out after {timeout_ms}ms")]
    ToolTimeout { tool_name: String, timeout_ms: u64 },

    /// Parameter mapping/validation failed for a named parameter.
    #[error("parameter '{parameter_name}' invalid for tool '{tool_name}': {reason}")]
    ParameterValidation {
        tool_name: String,
        parameter_name: String,
        reason: String,
    },

    /// The tool handler itself returned/raised an error during execution.
    #[error("tool '{tool_name}' execution failed: {message}")]
    ToolExecution { tool_name: String, message: String },
}

impl McpError {
    /// The JSON-RPC 2.0 error code for this error kind (§4.5 of the spec).
    pub fn rpc_code(&self) -> i32 {
        match self {
            McpError::ParseError { .. } => -32700,
            McpError::InvalidRequest { .. } => -32600,
            McpError::MethodNotFound { .. } => -32601,
            McpError::InvalidParams { .. } => -32602,
            McpError::InternalError { .. } => -32603,
            McpError::ToolNotFound { .. } => app_codes::TOOL_NOT_FOUND,
            McpError::ToolTimeout { .. } => app_codes::TOOL_TIMEOUT,
            McpError::ParameterValidation { .. } => app_codes::PARAMETER_VALIDATION,
            McpError::ToolExecution { .. } => app_codes::TOOL_EXECUTION,
        }
    }

    /// The HTTP status this error kind maps to when surfaced over `/v1`.
    pub fn http_status(&self) -> StatusCode {
        match self {
            McpError::ParseError { .. } => StatusCode::BAD_REQUEST,
            McpError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            McpError::MethodNotFound { .. } => StatusCode::NOT_FOUND,
            McpError::InvalidParams { .. } => StatusCode::BAD_REQUEST,
            McpError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            McpError::ToolNotFound { .. } => StatusCode::NOT_FOUND,
            McpError::ToolTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            McpError::ParameterValidation { .. } => StatusCode::BAD_REQUEST,
            McpError::ToolExecution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn tool_not_found(tool_name: impl Into<String>) -> Self {
        McpError::ToolNotFound {
            tool_name: tool_name.into(),
        }
    }

    pub fn parameter_validation(
        tool_name: impl Into<String>,
        parameter_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        McpError::ParameterValidation {
            tool_name: tool_name.into(),
            parameter_name: parameter_name.into(),
            reason: reason.into(),
        }
    }

    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        McpError::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

/// Recovers the HTTP status for a JSON-RPC error code once it has crossed
/// into a `JsonRpcResponse` and the original `McpError` value is gone (the
/// HTTP layer only has `JsonRpcError.code` to work with at that point).
/// Mirrors `McpError::http_status` exactly; the two must be kept in sync.
pub fn http_status_for_rpc_code(code: i32) -> actix_web::http::StatusCode {
    match code {
        -32700 => StatusCode::BAD_REQUEST,
        -32600 => StatusCode::BAD_REQUEST,
        -32601 => StatusCode::NOT_FOUND,
        -32602 => StatusCode::BAD_REQUEST,
        -32603 => StatusCode::INTERNAL_SERVER_ERROR,
        app_codes::TOOL_NOT_FOUND => StatusCode::NOT_FOUND,
        app_codes::TOOL_TIMEOUT => StatusCode::REQUEST_TIMEOUT,
        app_codes::PARAMETER_VALIDATION => StatusCode::BAD_REQUEST,
        app_codes::TOOL_EXECUTION => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Errors internal to the Task Executor (§4.6, §7). These never cross the
/// Dispatcher boundary as a JSON-RPC error; a submission failure here is
/// reported either synchronously to the submitter (queue full) or recorded
/// as a terminal FAILED status on the task (unknown task type).
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error("unknown task type: {task_type}")]
    UnknownTaskType { task_type: String },

    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },
}

impl ExecutorError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            ExecutorError::UnknownTaskType { .. } => StatusCode::BAD_REQUEST,
            ExecutorError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ExecutorError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}
