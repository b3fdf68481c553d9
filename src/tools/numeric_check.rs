/// `numeric_check` — a bounded `double` parameter exercising the Parameter
/// Mapper's min/max validation path end-to-end (spec §8 scenario 4).
use std::collections::HashMap;

use serde_json::Value;

use crate::core::registry::{ToolDescriptor, ToolHandler};
use crate::core::schema::{ParameterDescriptor, ParameterType};

pub fn build() -> (ToolDescriptor, ToolHandler) {
    let descriptor = ToolDescriptor::new(
        "numeric_check",
        "Accepts a number within [0, 1] and echoes it back.",
        vec![ParameterDescriptor::new("x", ParameterType::Double)
            .required(true)
            .min(0.0)
            .max(1.0)
            .description("value to validate, inclusive range [0, 1]")],
    );

    let handler: ToolHandler = Box::new(|args: HashMap<String, Value>| {
        let x = args
            .get("x")
            .and_then(Value::as_f64)
            .ok_or_else(|| "missing required parameter: x".to_string())?;
        Ok(serde_json::json!({ "x": x }))
    });

    (descriptor, handler)
}
