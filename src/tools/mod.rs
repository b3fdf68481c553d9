/// Tool implementations (SPEC_FULL.md §10.6).
///
/// Synchronous tools (`echo`, `numeric_check`, `slow_echo`) are registered
/// with the Tool Registry in one atomic batch, mirroring the template's
/// "one `register` call per tool at startup" idiom but collected here so
/// the Registry's own atomicity guarantee (spec §4.2) covers the whole set.
/// `research_task` is a different shape entirely — a long-running
/// `TaskProcessor` registered with the Task Executor instead.
pub mod echo;
pub mod numeric_check;
pub mod research_task;
pub mod slow_echo;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::registry::{RegistrationError, ToolRegistry};

/// Build every synchronous tool and register them with the registry as one
/// atomic batch.
pub fn register_all(registry: &Arc<ToolRegistry>, config: &Config) -> Result<(), RegistrationError> {
    let mut tools = Vec::new();
    let mut handlers = HashMap::new();

    for (descriptor, handler) in [
        echo::build(config),
        numeric_check::build(),
        slow_echo::build(),
    ] {
        handlers.insert(descriptor.name.clone(), handler);
        tools.push(descriptor);
    }

    registry.register(tools, handlers)
}
