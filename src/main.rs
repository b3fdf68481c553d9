/// MCP Task Server Entry Point
///
/// Loads layered configuration, initialises structured logging, builds the
/// Tool Registry and Task Executor, then starts the transport the
/// configuration names ("stdio" or "http").
use std::sync::Arc;
use std::time::{Duration, Instant};

use mcp_task_server::collaborators::cache::{InMemoryDescriptionCache, NoopDescriptionCache};
use mcp_task_server::collaborators::persistence::InMemoryTaskStore;
use mcp_task_server::collaborators::pubsub::InMemoryProgressChannel;
use mcp_task_server::core::config::Config;
use mcp_task_server::core::registry::ToolRegistry;
use mcp_task_server::core::server::{self, AppState};
use mcp_task_server::executor::processors::ProcessorRegistry;
use mcp_task_server::executor::{ExecutorConfig, TaskExecutor};
use mcp_task_server::tools;
use mcp_task_server::tools::research_task::ResearchTaskProcessor;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let start = Instant::now();

    let registry = ToolRegistry::new();
    if let Err(e) = tools::register_all(&registry, &config) {
        tracing::error!(error = %e, "tool registration failed; refusing to start with a partial registry");
        std::process::exit(1);
    }

    let _description_cache: Arc<dyn mcp_task_server::collaborators::cache::DescriptionCache> =
        if config.cache_provider == "persistent" {
            Arc::new(InMemoryDescriptionCache::new())
        } else {
            Arc::new(NoopDescriptionCache)
        };

    let mut processors = ProcessorRegistry::new();
    processors.register("research_task", Arc::new(ResearchTaskProcessor::new()));

    let executor_config = ExecutorConfig {
        worker_parallelism: config.worker_parallelism,
        default_timeout_seconds: config.default_timeout_ms / 1000,
        default_max_retries: 0,
        queue_capacity: config.queue_capacity,
        stuck_task_threshold: config.stuck_task_threshold(),
        retention: config.retention(),
    };
    let executor = TaskExecutor::start(
        processors,
        InMemoryTaskStore::new(),
        Arc::new(InMemoryProgressChannel::new()),
        executor_config,
    );

    let initialization_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        tool_count = registry.stats().tool_count,
        initialization_time_ms,
        "tools registered"
    );

    let default_timeout = Duration::from_millis(config.default_timeout_ms);
    let server_name = config.server_name.clone();
    let server_version = config.server_version.clone();
    let host = config.host.clone();
    let port = config.port;
    let transport_mode = config.transport_mode.clone();

    let state = AppState {
        server_name,
        server_version,
        registry,
        executor,
        config: Arc::new(config),
        default_timeout,
        initialization_time_ms,
    };

    match transport_mode.as_str() {
        "stdio" => server::run_server_stdio(state).await,
        "http" => server::run_server_http(state, host, port).await,
        other => {
            eprintln!("Error: invalid transport mode '{other}'. Must be 'stdio' or 'http'");
            std::process::exit(1);
        }
    }
}
