/// `slow_echo` — sleeps for the caller-supplied `ms` before responding,
/// exercising the Dispatcher's tool-level timeout (spec §8 scenario 3).
/// Handlers run inside `spawn_blocking`, so a blocking sleep here behaves
/// exactly like a slow synchronous handler would in production.
use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::core::registry::{ToolDescriptor, ToolHandler};
use crate::core::schema::{ParameterDescriptor, ParameterType};

pub fn build() -> (ToolDescriptor, ToolHandler) {
    let descriptor = ToolDescriptor::new(
        "slow_echo",
        "Sleeps for the given number of milliseconds, then echoes it back.",
        vec![ParameterDescriptor::new("ms", ParameterType::Integer)
            .required(true)
            .min(0.0)
            .description("milliseconds to sleep before responding")],
    )
    .timeout_ms(100);

    let handler: ToolHandler = Box::new(|args: HashMap<String, Value>| {
        let ms = args
            .get("ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| "missing required parameter: ms".to_string())?;
        std::thread::sleep(Duration::from_millis(ms));
        Ok(Value::String(format!("slept {ms}ms")))
    });

    (descriptor, handler)
}
