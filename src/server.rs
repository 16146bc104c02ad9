//! HTTP tool server with an MCP endpoint.
//!
//! All tools live in one [`ToolRegistry`] and are dispatched through the
//! same `POST /tools/{name}` handler. The MCP Streamable HTTP endpoint at
//! `/mcp` bridges the same registry for MCP clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/tools/list` | List registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `*`    | `/mcp` | MCP Streamable HTTP (JSON-RPC) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "gameId must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `store_unavailable` (503), `tool_error` (500).
//!
//! All origins, methods, and headers are permitted (CORS).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use envsync_core::store::Store;
use envsync_core::{KeyLocks, StoreError, SyncError};

use crate::config::Config;
use crate::mcp::McpBridge;
use crate::sqlite_store::SqliteStore;
use crate::traits::{validate_params, ParamError, ToolContext, ToolRegistry};

/// Shared state passed to every route handler.
#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Start the server on `[server].bind` over the configured SQLite store.
///
/// Runs until the process is terminated. Entry point for `envsync serve mcp`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(config).await?);
    run_server_with_store(config, store, ToolRegistry::with_builtins()).await
}

/// Start the server over an arbitrary store and tool set.
pub async fn run_server_with_store(
    config: &Config,
    store: Arc<dyn Store>,
    tools: ToolRegistry,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config, store, tools);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "tool server listening");
    println!("envsync tool server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router. The store and one lock table are shared by every
/// HTTP and MCP request.
pub fn router(config: &Config, store: Arc<dyn Store>, tools: ToolRegistry) -> Router {
    let config = Arc::new(config.clone());
    let ctx = ToolContext::with_locks(config, store, Arc::new(KeyLocks::new()));
    let tools = Arc::new(tools);

    for t in tools.tools() {
        debug!(tool = t.name(), builtin = t.is_builtin(), "registered tool");
    }

    let bridge = McpBridge::new(ctx.clone(), tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let state = AppState { tools, ctx };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn store_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "store_unavailable",
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
    }
}

/// Map a tool failure to an HTTP status by its typed cause.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{}: {}", tool_name, err);

    if err.downcast_ref::<ParamError>().is_some() {
        return bad_request(msg);
    }
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::StoreUnavailable(_)) => return store_unavailable(msg),
        Some(SyncError::SameEnvironment(_)) => return bad_request(msg),
        None => {}
    }
    match err.downcast_ref::<StoreError>() {
        Some(e) if e.is_unavailable() => store_unavailable(msg),
        _ => tool_error(msg),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    builtin: bool,
    mutates: bool,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            builtin: t.is_builtin(),
            mutates: t.mutates(),
            parameters: t.parameters_schema(),
        })
        .collect();

    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Returns `404` for an unknown tool, `400` for invalid parameters,
/// `503` when an environment is unreachable, and `500` otherwise.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(format!("{}: {}", name, e)))?;

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
