/// Configuration (spec §6, SPEC_FULL.md §10.3).
///
/// Layered load: compiled-in defaults, then an optional YAML file (path
/// from `CONFIG_PATH`, missing file is not an error — same stance the
/// template took with its stubbed `load_config`), then individual
/// environment variable overrides. Centralises what the template server
/// scattered across `env::var(...).unwrap_or_else(...)` calls in `main`.
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

fn default_scan_packages() -> Vec<String> {
    Vec::new()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_name: String,
    pub server_version: String,
    pub host: String,
    pub port: u16,
    /// "stdio" or "http".
    pub transport_mode: String,

    #[serde(default = "default_scan_packages")]
    pub scan_packages: Vec<String>,
    pub default_timeout_ms: u64,
    pub max_initialization_time_ms: u64,
    pub worker_parallelism: usize,
    pub stuck_task_threshold_minutes: u64,
    pub retention_days: u64,
    pub async_enabled: bool,
    pub log_tool_discovery: bool,
    pub log_tool_execution: bool,
    pub log_performance_metrics: bool,
    /// "none" or "persistent".
    pub cache_provider: String,
    /// Unbounded dispatch queue when `None` (spec Open Question #2).
    pub queue_capacity: Option<usize>,
    /// Reserved, not yet consulted: retries re-queue immediately today
    /// (spec Open Question #3).
    pub retry_backoff_ms: Option<u64>,

    #[serde(default)]
    pub tools: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: "mcp-task-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            transport_mode: "stdio".to_string(),
            scan_packages: default_scan_packages(),
            default_timeout_ms: 10_000,
            max_initialization_time_ms: 5_000,
            worker_parallelism: 4,
            stuck_task_threshold_minutes: 30,
            retention_days: 7,
            async_enabled: true,
            log_tool_discovery: true,
            log_tool_execution: true,
            log_performance_metrics: false,
            cache_provider: "none".to_string(),
            queue_capacity: None,
            retry_backoff_ms: None,
            tools: Map::new(),
        }
    }
}

impl Config {
    /// Build a `Config` from defaults, an optional `CONFIG_PATH` YAML file,
    /// then environment variable overrides (later wins at each stage).
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("CONFIG_PATH") {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(from_file) => config = from_file,
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "failed to parse config file, using defaults");
                    }
                },
                Err(_) => {
                    tracing::debug!(path = %path, "CONFIG_PATH set but file not found, using defaults");
                }
            }
        }

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_NAME") {
            self.server_name = v;
        }
        if let Ok(v) = env::var("SERVER_VERSION") {
            self.server_version = v;
        }
        if let Ok(v) = env::var("HOST") {
            self.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            if let Ok(port) = v.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = env::var("MCP_TRANSPORT_MODE") {
            self.transport_mode = v;
        }
        if let Ok(v) = env::var("WORKER_PARALLELISM") {
            if let Ok(n) = v.parse() {
                self.worker_parallelism = n;
            }
        }
        if let Ok(v) = env::var("DEFAULT_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.default_timeout_ms = n;
            }
        }
        if let Ok(v) = env::var("STUCK_TASK_THRESHOLD_MINUTES") {
            if let Ok(n) = v.parse() {
                self.stuck_task_threshold_minutes = n;
            }
        }
        if let Ok(v) = env::var("RETENTION_DAYS") {
            if let Ok(n) = v.parse() {
                self.retention_days = n;
            }
        }
        if let Ok(v) = env::var("CACHE_PROVIDER") {
            self.cache_provider = v;
        }
        // RUST_LOG is read directly by tracing_subscriber::EnvFilter; not
        // mirrored onto the struct.
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn stuck_task_threshold(&self) -> Duration {
        Duration::from_secs(self.stuck_task_threshold_minutes * 60)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    /// Per-tool configuration overrides, mirroring the template's
    /// `utils::get_tool_config("echo")` lookup (e.g. echo's `prefix`).
    pub fn tool_config(&self, tool_name: &str) -> HashMap<String, Value> {
        self.tools
            .get(tool_name)
            .and_then(Value::as_object)
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default()
    }
}
