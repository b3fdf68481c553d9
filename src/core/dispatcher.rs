/// JSON-RPC 2.0 Dispatcher (spec §4.5).
///
/// Validates the envelope, routes `tools/list` and `tools/call`, and wraps
/// tool invocation in the dispatcher-level timeout. This is the same
/// request/response/error shape the template server used for its two
/// hand-rolled methods, generalised to an arbitrary tool registry and a
/// configurable per-call timeout.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{serialize_result, ToolCallResult};
use super::error::McpError;
use super::mapper::map_parameters;
use super::registry::ToolRegistry;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: &McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error.rpc_code(),
                message: error.to_string(),
                data: None,
            }),
        }
    }
}

/// A notification (no `id`) never produces a response, per the JSON-RPC
/// spec and the stdio transport's original skip-if-notification handling.
pub fn is_notification(request: &JsonRpcRequest) -> bool {
    request.id.is_none()
}

fn validate_envelope(request: &JsonRpcRequest) -> Result<(), McpError> {
    if request.jsonrpc != "2.0" {
        return Err(McpError::InvalidRequest {
            message: format!("unsupported jsonrpc version: {}", request.jsonrpc),
        });
    }
    if request.method.trim().is_empty() {
        return Err(McpError::InvalidRequest {
            message: "method must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Dispatch a single validated request against the tool registry. The
/// caller is responsible for suppressing the response when
/// `is_notification` is true.
pub async fn dispatch(
    registry: &Arc<ToolRegistry>,
    default_timeout: Duration,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    let id = request.id.clone();

    if let Err(err) = validate_envelope(&request) {
        return JsonRpcResponse::failure(id, &err);
    }

    let outcome = match request.method.as_str() {
        "tools/list" => Ok(handle_tools_list(registry)),
        "tools/call" => handle_tools_call(registry, default_timeout, request.params).await,
        other => Err(McpError::MethodNotFound {
            method: other.to_string(),
        }),
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err) => JsonRpcResponse::failure(id, &err),
    }
}

fn handle_tools_list(registry: &Arc<ToolRegistry>) -> Value {
    let tools: Vec<Value> = registry
        .list()
        .into_iter()
        .filter(|t| t.enabled)
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "description": t.description,
                "inputSchema": t.input_schema,
            })
        })
        .collect();
    serde_json::json!({ "tools": tools })
}

async fn handle_tools_call(
    registry: &Arc<ToolRegistry>,
    default_timeout: Duration,
    params: Option<Value>,
) -> Result<Value, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidParams {
        message: "missing params for tools/call".to_string(),
    })?;

    let tool_name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams {
            message: "params.name must be a string".to_string(),
        })?
        .to_string();

    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    let tool = registry
        .lookup(&tool_name)
        .filter(|t| t.enabled)
        .ok_or_else(|| McpError::tool_not_found(&tool_name))?;

    let handler = registry
        .handler_for(&tool_name)
        .ok_or_else(|| McpError::tool_not_found(&tool_name))?;

    let mapped = map_parameters(&tool, &arguments)?;

    let timeout = if tool.timeout_ms > 0 {
        Duration::from_millis(tool.timeout_ms)
    } else {
        default_timeout
    };

    let tool_name_for_timeout = tool_name.clone();
    let invocation = tokio::task::spawn_blocking(move || handler(mapped));

    let outcome = match tokio::time::timeout(timeout, invocation).await {
        Ok(Ok(handler_result)) => handler_result,
        Ok(Err(join_err)) => {
            return Err(McpError::ToolExecution {
                tool_name,
                message: format!("handler task panicked: {join_err}"),
            })
        }
        Err(_elapsed) => {
            return Err(McpError::ToolTimeout {
                tool_name: tool_name_for_timeout,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    };

    let result: ToolCallResult = match outcome {
        Ok(value) => serialize_result(value),
        Err(message) => {
            return Err(McpError::tool_execution(tool_name, message));
        }
    };

    serde_json::to_value(result).map_err(|e| McpError::InternalError {
        message: format!("failed to serialise tool result: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ToolDescriptor;
    use crate::core::schema::{ParameterDescriptor, ParameterType};
    use std::collections::HashMap as StdHashMap;

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new();
        let tool = ToolDescriptor::new(
            "echo",
            "echoes a message",
            vec![ParameterDescriptor::new("message", ParameterType::String).required(true)],
        );
        let mut handlers: StdHashMap<String, crate::core::registry::ToolHandler> = StdHashMap::new();
        handlers.insert(
            "echo".to_string(),
            Box::new(|args| Ok(args.get("message").cloned().unwrap_or(Value::Null))),
        );
        registry.register(vec![tool], handlers).unwrap();
        registry
    }

    fn req(method: &str, id: Option<Value>, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn tools_list_returns_registered_tools() {
        let registry = registry_with_echo();
        let response = dispatch(
            &registry,
            Duration::from_secs(1),
            req("tools/list", Some(Value::from(1)), None),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn tools_call_invokes_handler_and_wraps_result() {
        let registry = registry_with_echo();
        let params = serde_json::json!({ "name": "echo", "arguments": { "message": "hi" } });
        let response = dispatch(
            &registry,
            Duration::from_secs(1),
            req("tools/call", Some(Value::from(2)), Some(params)),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["text"], "hi");
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let registry = registry_with_echo();
        let response = dispatch(
            &registry,
            Duration::from_secs(1),
            req("bogus/method", Some(Value::from(3)), None),
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let registry = registry_with_echo();
        let params = serde_json::json!({ "name": "nope", "arguments": {} });
        let response = dispatch(
            &registry,
            Duration::from_secs(1),
            req("tools/call", Some(Value::from(4)), Some(params)),
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -31000);
    }

    #[tokio::test]
    async fn bad_jsonrpc_version_is_invalid_request() {
        let registry = registry_with_echo();
        let mut request = req("tools/list", Some(Value::from(5)), None);
        request.jsonrpc = "1.0".to_string();
        let response = dispatch(&registry, Duration::from_secs(1), request).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32600);
    }

    #[tokio::test]
    async fn notification_has_no_id_flagged_correctly() {
        let request = req("tools/list", None, None);
        assert!(is_notification(&request));
    }

    #[tokio::test]
    async fn slow_handler_times_out_with_machine_readable_message() {
        let registry = ToolRegistry::new();
        let tool = ToolDescriptor::new("slow", "sleeps", vec![]).timeout_ms(10);
        let mut handlers: StdHashMap<String, crate::core::registry::ToolHandler> = StdHashMap::new();
        handlers.insert(
            "slow".to_string(),
            Box::new(|_args| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(Value::Null)
            }),
        );
        registry.register(vec![tool], handlers).unwrap();

        let params = serde_json::json!({ "name": "slow", "arguments": {} });
        let response = dispatch(
            &registry,
            Duration::from_secs(1),
            req("tools/call", Some(Value::from(6)), Some(params)),
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -31001);
        assert!(error.message.contains("10ms"));
    }
}
