//! HTTP tool server.
//!
//! Exposes discovery as JSON tools for agents and services. All tools are
//! registered in a [`ToolRegistry`] and dispatched through the same
//! `POST /tools/{name}` handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid input: document must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500).
//!
//! # Cancellation
//!
//! Tool calls run on their own task. If the client goes away first, the
//! call's [`CancellationSignal`] is set and discovery stops at the next step
//! boundary.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use tablescout_core::{CancellationSignal, Discovery, DiscoveryError};

use crate::config::Config;
use crate::discover::build_discovery;
use crate::traits::{ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    discovery: Arc<Discovery>,
    tools: Arc<ToolRegistry>,
}

/// Start the server with the built-in tools.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_tools(config, ToolRegistry::with_builtins()).await
}

/// Start the server with a caller-supplied registry.
///
/// ```rust,no_run
/// use tablescout::server::run_server_with_tools;
/// use tablescout::traits::ToolRegistry;
///
/// # async fn example(config: &tablescout::config::Config) -> anyhow::Result<()> {
/// let mut tools = ToolRegistry::with_builtins();
/// // tools.register(Arc::new(MyTool));
/// run_server_with_tools(config, tools).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_tools(config: &Config, tools: ToolRegistry) -> anyhow::Result<()> {
    let discovery = Arc::new(build_discovery(config)?);

    for t in tools.tools() {
        tracing::info!(tool = t.name(), builtin = t.is_builtin(), "registered tool");
    }

    let app = router(discovery, Arc::new(tools));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("tool server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router; exposed so the server can be embedded.
pub fn router(discovery: Arc<Discovery>, tools: Arc<ToolRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { discovery, tools })
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

/// Input-contract violations are the caller's fault; everything else is ours.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    match err.downcast_ref::<DiscoveryError>() {
        Some(e) => bad_request(format!("{}: {}", tool_name, e)),
        None => tool_error(format!("{}: {:#}", tool_name, err)),
    }
}

/// Sets the signal when dropped unless disarmed.
struct CancelOnDrop {
    signal: CancellationSignal,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!("client disconnected; cancelling tool call");
            self.signal.cancel();
        }
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
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::from_tool(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Unified tool dispatch.
///
/// Returns `404` if the tool is not found, `400` for input-contract
/// violations, and `500` for execution errors.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    if !params.is_object() {
        return Err(bad_request("request body must be a JSON object"));
    }

    let cancel = CancellationSignal::new();
    let mut guard = CancelOnDrop {
        signal: cancel.clone(),
        armed: true,
    };

    let ctx = ToolContext::new(state.discovery.clone(), cancel);
    let task = tokio::spawn(async move { tool.execute(params, &ctx).await });

    let outcome = task.await;
    guard.armed = false;

    let result = outcome
        .map_err(|e| tool_error(format!("{}: task failed: {}", name, e)))?
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
