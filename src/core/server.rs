/// HTTP and STDIO transport wiring (spec §6).
///
/// Grounded in the template's `run_server_http`/`run_server_stdio` pair —
/// same middleware stack, same worker-count heuristic, same "stdio never
/// writes a non-protocol byte to stdout" rule — generalised from the
/// template's two hand-rolled methods to the full dispatch table plus the
/// Task Executor's external API (§6).
use std::sync::{Arc, Once};
use std::time::Duration;

use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::Config;
use crate::core::dispatcher::{self, JsonRpcRequest, JsonRpcResponse};
use crate::core::error::http_status_for_rpc_code;
use crate::core::registry::ToolRegistry;
use crate::executor::{SubmitOptions, TaskExecutor};

/// Shared across every worker thread (HTTP mode) or held by value (stdio
/// mode). Mirrors the template's `AppState`, extended with the registry,
/// executor and config this runtime actually needs at the handler layer.
pub struct AppState {
    pub server_name: String,
    pub server_version: String,
    pub registry: Arc<ToolRegistry>,
    pub executor: Arc<TaskExecutor>,
    pub config: Arc<Config>,
    pub default_timeout: Duration,
    /// Wall-clock time the Schema Builder + Tool Registry took to come up,
    /// measured once in `main` and frozen here (spec §6 health/metrics).
    pub initialization_time_ms: u64,
}

static LEGACY_SHIM_WARNING: Once = Once::new();

#[derive(Deserialize)]
struct ToolCallRequest {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct TaskSubmitRequest {
    task_type: String,
    query: String,
    #[serde(default)]
    options: TaskSubmitOptionsBody,
}

#[derive(Deserialize, Default)]
struct TaskSubmitOptionsBody {
    timeout_seconds: Option<u64>,
    max_retries: Option<u32>,
    requester_id: Option<String>,
}

#[derive(Serialize)]
struct TaskSubmitResponse {
    task_id: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    initialised: bool,
    initialization_time_ms: u64,
    tool_count: usize,
    framework: &'static str,
    version: String,
}

#[derive(Serialize)]
struct MetricsResponse {
    discovery_time_ms: u64,
    tool_count: usize,
    cache_enabled: bool,
    default_timeout_ms: u64,
}

fn response_with_status(response: JsonRpcResponse) -> HttpResponse {
    let status = match &response.error {
        Some(err) => http_status_for_rpc_code(err.code),
        None => actix_web::http::StatusCode::OK,
    };
    HttpResponse::build(status).json(response)
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let stats = state.registry.stats();
    HttpResponse::Ok().json(HealthResponse {
        status: if stats.initialised { "UP" } else { "DOWN" },
        initialised: stats.initialised,
        initialization_time_ms: state.initialization_time_ms,
        tool_count: stats.tool_count,
        framework: "mcp-task-server",
        version: state.server_version.clone(),
    })
}

async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    let stats = state.registry.stats();
    HttpResponse::Ok().json(MetricsResponse {
        discovery_time_ms: state.initialization_time_ms,
        tool_count: stats.tool_count,
        cache_enabled: state.config.cache_provider != "none",
        default_timeout_ms: state.config.default_timeout_ms,
    })
}

async fn list_tools(state: web::Data<AppState>) -> HttpResponse {
    if !state.registry.is_initialised() {
        return HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "not initialised",
        }));
    }
    let tools: Vec<Value> = state
        .registry
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
    HttpResponse::Ok().json(serde_json::json!({ "tools": tools }))
}

/// `POST /v1` — the canonical JSON-RPC 2.0 entry point.
async fn rpc_entrypoint(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            let err = crate::core::error::McpError::ParseError {
                message: e.to_string(),
            };
            return response_with_status(JsonRpcResponse::failure(None, &err));
        }
    };

    if dispatcher::is_notification(&request) {
        dispatcher::dispatch(&state.registry, state.default_timeout, request).await;
        return HttpResponse::NoContent().finish();
    }

    let response =
        dispatcher::dispatch(&state.registry, state.default_timeout, request).await;
    response_with_status(response)
}

/// `POST /v1/tools/call` — legacy shim (spec §9 Open Question #1). Re-wraps
/// the flat `ToolCallRequest` body as a synthetic JSON-RPC `tools/call`
/// request and re-uses the canonical dispatch path; no duplicated logic.
async fn legacy_tools_call(
    state: web::Data<AppState>,
    body: web::Json<ToolCallRequest>,
) -> HttpResponse {
    LEGACY_SHIM_WARNING.call_once(|| {
        tracing::warn!("POST /v1/tools/call is deprecated; use POST /v1 with method \"tools/call\"");
    });

    let synthetic = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(Value::from(0)),
        method: "tools/call".to_string(),
        params: Some(serde_json::json!({
            "name": body.name,
            "arguments": body.arguments.clone().unwrap_or(Value::Object(Default::default())),
        })),
    };

    let response = dispatcher::dispatch(&state.registry, state.default_timeout, synthetic).await;
    response_with_status(response)
}

async fn submit_task(
    state: web::Data<AppState>,
    body: web::Json<TaskSubmitRequest>,
) -> HttpResponse {
    let options = SubmitOptions {
        timeout_seconds: body.options.timeout_seconds,
        max_retries: body.options.max_retries,
        requester_id: body.options.requester_id.clone(),
    };
    match state
        .executor
        .submit(body.task_type.clone(), body.query.clone(), options)
        .await
    {
        Ok(task_id) => HttpResponse::Ok().json(TaskSubmitResponse { task_id }),
        Err(err) => HttpResponse::build(err.http_status()).json(serde_json::json!({
            "error": err.to_string(),
        })),
    }
}

async fn cancel_task(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.executor.cancel(&path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => HttpResponse::build(err.http_status()).json(serde_json::json!({
            "error": err.to_string(),
        })),
    }
}

async fn get_task(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.executor.get(&path.into_inner()) {
        Some(task) => HttpResponse::Ok().json(task),
        None => HttpResponse::NotFound().json(serde_json::json!({ "error": "task not found" })),
    }
}

async fn task_progress(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.executor.get(&path.into_inner()) {
        Some(task) => HttpResponse::Ok().json(serde_json::json!({
            "taskId": task.task_id,
            "status": task.status.as_str(),
            "progressPercent": task.progress_percent,
            "progressMessage": task.progress_message,
            "screenshots": task.screenshots,
        })),
        None => HttpResponse::NotFound().json(serde_json::json!({ "error": "task not found" })),
    }
}

/// Registers every route in the §6 HTTP surface. Shared between
/// `run_server_http` and the `actix_web::test`-driven integration suite
/// under `tests/`, so production and tests are always wired identically.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/tools", web::get().to(list_tools))
        .route("/v1/tools/call", web::post().to(legacy_tools_call))
        .route("/v1", web::post().to(rpc_entrypoint))
        .route("/v1/health", web::get().to(health))
        .route("/v1/metrics", web::get().to(metrics))
        .route("/tasks", web::post().to(submit_task))
        .route("/tasks/{taskId}/cancel", web::post().to(cancel_task))
        .route("/tasks/{taskId}/progress", web::get().to(task_progress))
        .route("/tasks/{taskId}", web::get().to(get_task));
}

/// Run the server in HTTP mode: same Actix middleware/timeout/connection
/// tuning as the template, pointed at the new dispatch table.
pub async fn run_server_http(state: AppState, host: String, port: u16) -> std::io::Result<()> {
    let bind_addr = format!("{host}:{port}");
    let data = web::Data::new(state);

    let workers = std::env::var("WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| num_cpus::get().min(16).max(1));

    tracing::info!(
        name = %data.server_name,
        version = %data.server_version,
        bind_addr = %bind_addr,
        workers,
        "MCP task server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .workers(workers)
    .max_connections(10_000)
    .max_connection_rate(1_000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the server in STDIO mode: line-delimited JSON-RPC over stdin/stdout,
/// identical buffering and "stderr only" logging stance as the template.
pub async fn run_server_stdio(state: AppState) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

    tracing::info!(
        name = %state.server_name,
        version = %state.server_version,
        "MCP task server starting (stdio mode)"
    );

    let stdin = tokio::io::stdin();
    let mut stdin = BufReader::with_capacity(8192, stdin).lines();
    let stdout = tokio::io::stdout();
    let mut stdout = BufWriter::with_capacity(8192, stdout);

    while let Some(line) = stdin.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let parsed: Result<JsonRpcRequest, _> = serde_json::from_str(&line);
        let request = match parsed {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse stdio request");
                if let Ok(partial) = serde_json::from_str::<Value>(&line) {
                    if let Some(id) = partial.get("id") {
                        let err = crate::core::error::McpError::ParseError {
                            message: e.to_string(),
                        };
                        let response = JsonRpcResponse::failure(Some(id.clone()), &err);
                        write_response_line(&mut stdout, &response).await?;
                    }
                }
                continue;
            }
        };

        if dispatcher::is_notification(&request) {
            // notifications/initialized and friends are one-way; still
            // run them through dispatch for side effects, but never write
            // a response line.
            dispatcher::dispatch(&state.registry, state.default_timeout, request).await;
            continue;
        }

        let response =
            dispatcher::dispatch(&state.registry, state.default_timeout, request).await;
        write_response_line(&mut stdout, &response).await?;
    }

    Ok(())
}

async fn write_response_line<W: tokio::io::AsyncWrite + Unpin>(
    stdout: &mut tokio::io::BufWriter<W>,
    response: &JsonRpcResponse,
) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialise stdio response");
            return Ok(());
        }
    };
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
