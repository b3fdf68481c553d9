/// Parameter Mapper (spec §4.3).
///
/// Turns the raw JSON object passed as `tools/call` `arguments` into a typed
/// `HashMap<String, Value>` a handler can consume directly, applying
/// defaults, coercion and validation along the way. The first violation
/// encountered aborts the whole call with a `ParameterValidation` error —
/// there is no partial application.
use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use super::error::McpError;
use super::registry::ToolDescriptor;
use super::schema::{ParameterDescriptor, ParameterType};

/// The sentinel argument key accepted for tools with exactly one string
/// parameter, so a caller that only knows how to pass free-form English can
/// still drive them (spec §4.1/§4.3).
pub const PLAIN_ENGLISH_SENTINEL: &str = "provideAllValuesInPlainEnglish";

/// Map and validate `arguments` against `tool`'s declared parameters.
pub fn map_parameters(
    tool: &ToolDescriptor,
    arguments: &Value,
) -> Result<HashMap<String, Value>, McpError> {
    let raw = coerce_to_object(tool, arguments)?;

    let known: std::collections::HashSet<&str> =
        tool.parameters.iter().map(|p| p.name.as_str()).collect();
    if let Some(extra) = raw.keys().find(|k| !known.contains(k.as_str())) {
        return Err(McpError::parameter_validation(
            &tool.name,
            extra,
            "unexpected parameter not declared by this tool (additionalProperties: false)",
        ));
    }

    let mut mapped = HashMap::with_capacity(tool.parameters.len());

    for param in &tool.parameters {
        let provided = raw.get(&param.name);
        let value = match provided {
            Some(v) if !v.is_null() => Some(v.clone()),
            _ => param.default_value.as_ref().map(|d| default_as_value(param, d)),
        };

        let value = match value {
            Some(v) => v,
            None => {
                if param.required {
                    return Err(McpError::parameter_validation(
                        &tool.name,
                        &param.name,
                        "required parameter is missing",
                    ));
                }
                continue;
            }
        };

        let coerced = coerce_type(&tool.name, param, &value)?;
        validate(&tool.name, param, &coerced)?;
        mapped.insert(param.name.clone(), coerced);
    }

    Ok(mapped)
}

/// Step 1: obtain a JSON object to read parameters from. Supports the
/// plain-English sentinel for single-string-parameter tools, and otherwise
/// requires `arguments` to already be an object (or absent, for zero-param
/// tools).
fn coerce_to_object(
    tool: &ToolDescriptor,
    arguments: &Value,
) -> Result<serde_json::Map<String, Value>, McpError> {
    match arguments {
        Value::Object(map) => {
            if tool.has_single_string_parameter() {
                let param_name = tool.parameters[0].name.clone();
                let real_key_present = map.get(&param_name).is_some_and(|v| !v.is_null());
                if let Some(Value::String(plain)) = map.get(PLAIN_ENGLISH_SENTINEL) {
                    if real_key_present {
                        // The declared parameter was actually supplied — it
                        // wins; just drop the sentinel so it isn't flagged
                        // as an undeclared argument below.
                        let mut out = map.clone();
                        out.remove(PLAIN_ENGLISH_SENTINEL);
                        return Ok(out);
                    }
                    let mut out = serde_json::Map::new();
                    out.insert(param_name, Value::String(plain.clone()));
                    return Ok(out);
                }
            }
            Ok(map.clone())
        }
        Value::Null => Ok(serde_json::Map::new()),
        _ => Err(McpError::InvalidParams {
            message: "arguments must be a JSON object".to_string(),
        }),
    }
}

fn default_as_value(param: &ParameterDescriptor, default: &str) -> Value {
    match param.param_type {
        ParameterType::Integer | ParameterType::Long => serde_json::from_str(default)
            .unwrap_or_else(|_| Value::String(default.to_string())),
        ParameterType::Double => serde_json::from_str(default)
            .unwrap_or_else(|_| Value::String(default.to_string())),
        ParameterType::Boolean => serde_json::from_str(default)
            .unwrap_or_else(|_| Value::String(default.to_string())),
        ParameterType::String | ParameterType::Object => Value::String(default.to_string()),
    }
}

/// Step 3: coerce the provided JSON value to the parameter's declared type.
fn coerce_type(
    tool_name: &str,
    param: &ParameterDescriptor,
    value: &Value,
) -> Result<Value, McpError> {
    let invalid = || {
        McpError::parameter_validation(
            tool_name,
            &param.name,
            format!("expected {:?}, got {}", param.param_type, describe(value)),
        )
    };

    match param.param_type {
        ParameterType::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid()),
        },
        ParameterType::Integer | ParameterType::Long => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        return Ok(serde_json::json!(f as i64));
                    }
                }
                Err(invalid())
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| serde_json::json!(n))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ParameterType::Double => match value {
            Value::Number(n) => Ok(serde_json::json!(n.as_f64().ok_or_else(invalid)?)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(|f| serde_json::json!(f))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ParameterType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        },
        ParameterType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(invalid()),
        },
    }
}

/// Step 4: enforce pattern/min/max/enum constraints against the coerced value.
fn validate(tool_name: &str, param: &ParameterDescriptor, value: &Value) -> Result<(), McpError> {
    if let (Some(pattern), Value::String(s)) = (&param.pattern, value) {
        let re = Regex::new(pattern).map_err(|e| {
            McpError::parameter_validation(
                tool_name,
                &param.name,
                format!("invalid pattern configured: {e}"),
            )
        })?;
        if !re.is_match(s) {
            return Err(McpError::parameter_validation(
                tool_name,
                &param.name,
                format!("does not match required pattern {pattern}"),
            ));
        }
    }

    if let Some(values) = &param.enum_values {
        if !values.is_empty() {
            let as_str = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !values.iter().any(|v| v == &as_str) {
                return Err(McpError::parameter_validation(
                    tool_name,
                    &param.name,
                    format!("must be one of {values:?}"),
                ));
            }
        }
    }

    if let Value::Number(n) = value {
        let num = n.as_f64().unwrap_or(f64::NAN);
        if let Some(min) = param.min {
            if num < min {
                return Err(McpError::parameter_validation(
                    tool_name,
                    &param.name,
                    format!("must be >= {min}"),
                ));
            }
        }
        if let Some(max) = param.max {
            if num > max {
                return Err(McpError::parameter_validation(
                    tool_name,
                    &param.name,
                    format!("must be <= {max}"),
                ));
            }
        }
    }

    Ok(())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_with_params(name: &str, params: Vec<ParameterDescriptor>) -> ToolDescriptor {
        ToolDescriptor::new(name, "test tool", params)
    }

    #[test]
    fn plain_english_sentinel_maps_to_sole_string_param() {
        let tool = tool_with_params(
            "echo",
            vec![ParameterDescriptor::new("message", ParameterType::String).required(true)],
        );
        let args = json!({ PLAIN_ENGLISH_SENTINEL: "hello there" });
        let mapped = map_parameters(&tool, &args).unwrap();
        assert_eq!(mapped["message"], json!("hello there"));
    }

    #[test]
    fn real_parameter_wins_over_plain_english_sentinel() {
        let tool = tool_with_params(
            "echo",
            vec![ParameterDescriptor::new("message", ParameterType::String).required(true)],
        );
        let args = json!({ "message": "real", PLAIN_ENGLISH_SENTINEL: "english" });
        let mapped = map_parameters(&tool, &args).unwrap();
        assert_eq!(mapped["message"], json!("real"));
    }

    #[test]
    fn missing_required_parameter_errors() {
        let tool = tool_with_params(
            "echo",
            vec![ParameterDescriptor::new("message", ParameterType::String).required(true)],
        );
        let err = map_parameters(&tool, &json!({})).unwrap_err();
        assert!(matches!(err, McpError::ParameterValidation { .. }));
    }

    #[test]
    fn default_value_satisfies_required_parameter() {
        let tool = tool_with_params(
            "greet",
            vec![ParameterDescriptor::new("greeting", ParameterType::String)
                .required(true)
                .default_value("hi")],
        );
        let mapped = map_parameters(&tool, &json!({})).unwrap();
        assert_eq!(mapped["greeting"], json!("hi"));
    }

    #[test]
    fn numeric_string_is_coerced_to_integer() {
        let tool = tool_with_params(
            "count",
            vec![ParameterDescriptor::new("n", ParameterType::Integer).required(true)],
        );
        let mapped = map_parameters(&tool, &json!({ "n": "42" })).unwrap();
        assert_eq!(mapped["n"], json!(42));
    }

    #[test]
    fn out_of_range_double_is_rejected() {
        let tool = tool_with_params(
            "numeric_check",
            vec![ParameterDescriptor::new("value", ParameterType::Double)
                .required(true)
                .min(0.0)
                .max(100.0)],
        );
        let err = map_parameters(&tool, &json!({ "value": 150.0 })).unwrap_err();
        assert!(matches!(err, McpError::ParameterValidation { .. }));
    }

    #[test]
    fn pattern_mismatch_is_rejected() {
        let tool = tool_with_params(
            "color",
            vec![ParameterDescriptor::new("hex", ParameterType::String)
                .required(true)
                .pattern("^#[0-9a-f]{6}$")],
        );
        let err = map_parameters(&tool, &json!({ "hex": "red" })).unwrap_err();
        assert!(matches!(err, McpError::ParameterValidation { .. }));
    }

    #[test]
    fn enum_mismatch_is_rejected() {
        let tool = tool_with_params(
            "mode",
            vec![ParameterDescriptor::new("mode", ParameterType::String)
                .required(true)
                .enum_values(vec!["fast".into(), "slow".into()])],
        );
        let err = map_parameters(&tool, &json!({ "mode": "medium" })).unwrap_err();
        assert!(matches!(err, McpError::ParameterValidation { .. }));
    }

    #[test]
    fn optional_missing_parameter_is_simply_absent() {
        let tool = tool_with_params(
            "echo",
            vec![
                ParameterDescriptor::new("message", ParameterType::String).required(true),
                ParameterDescriptor::new("prefix", ParameterType::String),
            ],
        );
        let mapped = map_parameters(&tool, &json!({ "message": "hi" })).unwrap();
        assert!(!mapped.contains_key("prefix"));
    }

    #[test]
    fn zero_parameter_tool_accepts_empty_and_rejects_extra_keys() {
        let tool = tool_with_params("ping", vec![]);
        assert!(map_parameters(&tool, &json!({})).is_ok());

        let err = map_parameters(&tool, &json!({ "unexpected": 1 })).unwrap_err();
        assert!(matches!(err, McpError::ParameterValidation { .. }));
    }

    #[test]
    fn undeclared_argument_key_is_rejected() {
        let tool = tool_with_params(
            "echo",
            vec![ParameterDescriptor::new("message", ParameterType::String).required(true)],
        );
        let err = map_parameters(&tool, &json!({ "message": "hi", "bogus": "x" })).unwrap_err();
        assert!(matches!(err, McpError::ParameterValidation { .. }));
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let tool = tool_with_params(
            "echo",
            vec![ParameterDescriptor::new("message", ParameterType::String).required(true)],
        );
        let err = map_parameters(&tool, &json!("not an object")).unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }
}
