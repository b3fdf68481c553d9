/// Echo tool (SPEC_FULL.md §10.6) — adapted from the template's example
/// tool to the `ToolDescriptor`/`ParameterDescriptor` model. Keeps the
/// template's optional `prefix` tool-config behaviour.
use std::collections::HashMap;

use serde_json::Value;

use crate::core::config::Config;
use crate::core::registry::{ToolDescriptor, ToolHandler};
use crate::core::schema::{ParameterDescriptor, ParameterType};

pub fn build(config: &Config) -> (ToolDescriptor, ToolHandler) {
    let descriptor = ToolDescriptor::new(
        "echo",
        "Echo a message back to the client.",
        vec![ParameterDescriptor::new("message", ParameterType::String)
            .required(true)
            .description("The message to echo")],
    );

    let prefix = config
        .tool_config("echo")
        .get("prefix")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let handler: ToolHandler = Box::new(move |args: HashMap<String, Value>| {
        let message = args
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required parameter: message".to_string())?;

        let result = if prefix.is_empty() {
            message.to_string()
        } else {
            format!("{prefix}{message}")
        };
        Ok(Value::String(result))
    });

    (descriptor, handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echoes_message_without_prefix() {
        let (_descriptor, handler) = build(&Config::default());
        let mut args = HashMap::new();
        args.insert("message".to_string(), Value::String("hi".into()));
        assert_eq!(handler(args).unwrap(), Value::String("hi".into()));
    }

    #[test]
    fn applies_configured_prefix() {
        let mut config = Config::default();
        let mut echo_section = serde_json::Map::new();
        echo_section.insert("prefix".to_string(), Value::String("> ".to_string()));
        config.tools.insert("echo".to_string(), Value::Object(echo_section));

        let (_descriptor, handler) = build(&config);
        let mut args = HashMap::new();
        args.insert("message".to_string(), Value::String("hi".into()));
        assert_eq!(handler(args).unwrap(), Value::String("> hi".into()));
    }

    #[test]
    fn missing_message_is_an_error() {
        let (_descriptor, handler) = build(&Config::default());
        assert!(handler(HashMap::new()).is_err());
    }
}
