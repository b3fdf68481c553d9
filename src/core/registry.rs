/// Tool Registry (spec §4.2).
///
/// In-memory map from tool name to (metadata, handler). Built once at
/// startup from a batch of `(ToolDescriptor, Handler)` pairs and read-mostly
/// afterwards — the same "concurrent map, one writer at startup, many
/// readers" shape the upstream registry uses for its own tool table, but
/// keyed on locally declared actions rather than proxied backend tools.
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use super::schema::{build_schema, ParameterDescriptor};

/// A tool handler: takes the typed argument vector produced by the
/// Parameter Mapper and returns a JSON value (or an error message) the
/// Result Serialiser turns into a `ToolCallResult`. Synchronous handlers
/// are invoked directly by the Dispatcher; long-running tools are instead
/// registered as task-type sub-processors with the Task Executor (§4.6)
/// and are not part of this registry.
pub type ToolHandler =
    Box<dyn Fn(HashMap<String, Value>) -> Result<Value, String> + Send + Sync>;

/// Immutable tool metadata (spec §3). `input_schema` is always derived from
/// `parameters` via `build_schema` — the two can never drift because there
/// is no setter for `input_schema`.
#[derive(Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// 0 means "use the dispatcher's configured default timeout".
    pub timeout_ms: u64,
    #[serde(skip)]
    pub parameters: Vec<ParameterDescriptor>,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
    ) -> Self {
        let input_schema = build_schema(&parameters);
        Self {
            name: name.into(),
            description: description.into(),
            enabled: true,
            timeout_ms: 0,
            parameters,
            input_schema,
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// True when the tool declares exactly one string parameter, in which
    /// case the Parameter Mapper also accepts the sentinel key
    /// `provideAllValuesInPlainEnglish` (spec §4.1/§4.3).
    pub fn has_single_string_parameter(&self) -> bool {
        self.parameters.len() == 1
            && matches!(
                self.parameters[0].param_type,
                super::schema::ParameterType::String
            )
    }
}

#[derive(Serialize)]
pub struct RegistryStats {
    pub tool_count: usize,
    pub handler_count: usize,
    pub initialised: bool,
}

/// Error returned when a batch of `(descriptor, handler)` pairs fails
/// validation. The registry is left untouched on failure (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    EmptyMismatch,
    DuplicateName(String),
    MissingHandler(String),
    MissingTool(String),
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationError::EmptyMismatch => {
                write!(f, "tools and handlers must be non-empty together")
            }
            RegistrationError::DuplicateName(n) => write!(f, "duplicate tool name: {n}"),
            RegistrationError::MissingHandler(n) => {
                write!(f, "tool '{n}' has no matching handler")
            }
            RegistrationError::MissingTool(n) => {
                write!(f, "handler '{n}' has no matching tool descriptor")
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Concurrent tool registry. One atomic `register` call at startup,
/// read-mostly (`DashMap`) afterwards, mirroring how the upstream gateway's
/// registry is built for lock-free concurrent reads.
pub struct ToolRegistry {
    tools: DashMap<String, ToolDescriptor>,
    handlers: DashMap<String, Arc<ToolHandler>>,
    /// Insertion order, preserved for `list()` (spec §4.2: "stable order =
    /// insertion order").
    order: std::sync::RwLock<Vec<String>>,
    initialised: std::sync::atomic::AtomicBool,
}

impl ToolRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tools: DashMap::new(),
            handlers: DashMap::new(),
            order: std::sync::RwLock::new(Vec::new()),
            initialised: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Atomically register a batch of tools with their handlers. Validates
    /// the whole batch before mutating any shared state, so a single bad
    /// entry never partially pollutes an already-initialised registry.
    pub fn register(
        &self,
        tools: Vec<ToolDescriptor>,
        mut handlers: HashMap<String, ToolHandler>,
    ) -> Result<(), RegistrationError> {
        if tools.is_empty() != handlers.is_empty() {
            return Err(RegistrationError::EmptyMismatch);
        }

        let mut seen = std::collections::HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.clone()) {
                return Err(RegistrationError::DuplicateName(tool.name.clone()));
            }
            if !handlers.contains_key(&tool.name) {
                return Err(RegistrationError::MissingHandler(tool.name.clone()));
            }
        }
        for name in handlers.keys() {
            if !seen.contains(name) {
                return Err(RegistrationError::MissingTool(name.clone()));
            }
        }

        // Validation passed for the whole batch — now mutate.
        let mut order = self.order.write().unwrap_or_else(|e| e.into_inner());
        for tool in tools {
            let name = tool.name.clone();
            if let Some(handler) = handlers.remove(&name) {
                self.handlers.insert(name.clone(), Arc::new(handler));
            }
            if !self.tools.contains_key(&name) {
                order.push(name.clone());
            }
            self.tools.insert(name, tool);
        }
        self.initialised
            .store(true, std::sync::atomic::Ordering::Release);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|r| r.value().clone())
    }

    pub fn handler_for(&self, name: &str) -> Option<Arc<ToolHandler>> {
        self.handlers.get(name).map(|r| Arc::clone(r.value()))
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        let order = self.order.read().unwrap_or_else(|e| e.into_inner());
        order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|r| r.value().clone()))
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            tool_count: self.tools.len(),
            handler_count: self.handlers.len(),
            initialised: self.initialised.load(std::sync::atomic::Ordering::Acquire),
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised.load(std::sync::atomic::Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ParameterType;

    fn sample_tool(name: &str) -> (ToolDescriptor, ToolHandler) {
        let descriptor = ToolDescriptor::new(
            name,
            "a sample tool",
            vec![ParameterDescriptor::new("text", ParameterType::String).required(true)],
        );
        let handler: ToolHandler = Box::new(|args| {
            Ok(args
                .get("text")
                .cloned()
                .unwrap_or(Value::Null))
        });
        (descriptor, handler)
    }

    #[test]
    fn register_then_lookup_and_invoke() {
        let registry = ToolRegistry::new();
        let (tool, handler) = sample_tool("echo");
        let mut handlers = HashMap::new();
        handlers.insert("echo".to_string(), handler);
        registry.register(vec![tool], handlers).unwrap();

        assert!(registry.lookup("echo").is_some());
        let handler = registry.handler_for("echo").unwrap();
        let mut args = HashMap::new();
        args.insert("text".to_string(), Value::String("hi".into()));
        assert_eq!(handler(args).unwrap(), Value::String("hi".into()));

        let stats = registry.stats();
        assert_eq!(stats.tool_count, 1);
        assert_eq!(stats.handler_count, 1);
        assert!(stats.initialised);
    }

    #[test]
    fn toolcount_equals_handlercount_after_success() {
        let registry = ToolRegistry::new();
        let mut tools = Vec::new();
        let mut handlers = HashMap::new();
        for name in ["a", "b", "c"] {
            let (t, h) = sample_tool(name);
            tools.push(t);
            handlers.insert(name.to_string(), h);
        }
        registry.register(tools, handlers).unwrap();
        let stats = registry.stats();
        assert_eq!(stats.tool_count, stats.handler_count);
        assert_eq!(stats.tool_count, 3);
    }

    #[test]
    fn duplicate_name_rejected_and_registry_untouched() {
        let registry = ToolRegistry::new();
        let (t1, h1) = sample_tool("dup");
        let (t2, h2) = sample_tool("dup");
        let mut handlers = HashMap::new();
        handlers.insert("dup".to_string(), h1);
        handlers.insert("other".to_string(), h2);
        let err = registry.register(vec![t1, t2], handlers).unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateName("dup".to_string()));
        assert_eq!(registry.stats().tool_count, 0);
    }

    #[test]
    fn missing_handler_rejected() {
        let registry = ToolRegistry::new();
        let (tool, _handler) = sample_tool("orphan");
        let err = registry
            .register(vec![tool], HashMap::new())
            .unwrap_err();
        assert_eq!(err, RegistrationError::EmptyMismatch);
    }

    #[test]
    fn mismatched_handler_name_rejected() {
        let registry = ToolRegistry::new();
        let (tool, handler) = sample_tool("alpha");
        let mut handlers = HashMap::new();
        handlers.insert("beta".to_string(), handler);
        let err = registry.register(vec![tool], handlers).unwrap_err();
        assert_eq!(err, RegistrationError::MissingHandler("alpha".to_string()));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = ToolRegistry::new();
        let mut tools = Vec::new();
        let mut handlers = HashMap::new();
        for name in ["zeta", "alpha", "mid"] {
            let (t, h) = sample_tool(name);
            tools.push(t);
            handlers.insert(name.to_string(), h);
        }
        registry.register(tools, handlers).unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn failed_registration_leaves_prior_state_intact() {
        let registry = ToolRegistry::new();
        let (tool, handler) = sample_tool("keeper");
        let mut handlers = HashMap::new();
        handlers.insert("keeper".to_string(), handler);
        registry.register(vec![tool], handlers).unwrap();

        let (bad_tool, _) = sample_tool("bad");
        let err = registry.register(vec![bad_tool], HashMap::new());
        assert!(err.is_err());
        assert!(registry.lookup("keeper").is_some());
        assert_eq!(registry.stats().tool_count, 1);
    }

    #[test]
    fn single_string_parameter_detection() {
        let tool = ToolDescriptor::new(
            "one_string",
            "desc",
            vec![ParameterDescriptor::new("text", ParameterType::String).required(true)],
        );
        assert!(tool.has_single_string_parameter());

        let tool2 = ToolDescriptor::new(
            "two_params",
            "desc",
            vec![
                ParameterDescriptor::new("text", ParameterType::String).required(true),
                ParameterDescriptor::new("count", ParameterType::Integer),
            ],
        );
        assert!(!tool2.has_single_string_parameter());
    }
}
