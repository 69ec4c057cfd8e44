//! The bridge server: one port, two protocols. HTTP JSON-RPC for
//! coding-assistant clients on `/mcp`, a WebSocket for browser agents on
//! `/ws`, plus `/health` and `/cleanup-connections` as operational aids.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use tabbridge_core::{Config, Error, Result};
use tabbridge_session::{handle_socket, spawn_sweeper, BridgeState};
use tabbridge_shape::CursorStore;
use tabbridge_tools::{resources, ToolCtx, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<BridgeState>,
    pub cursors: Arc<CursorStore>,
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cursor_ttl = Duration::from_secs(config.limits.cursor_ttl_secs);
        Self {
            bridge: BridgeState::new(config),
            cursors: Arc::new(CursorStore::new(cursor_ttl)),
            tools: Arc::new(ToolRegistry::with_defaults()),
        }
    }

    fn tool_ctx(&self) -> ToolCtx {
        ToolCtx {
            bridge: self.bridge.clone(),
            cursors: self.cursors.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/ws", get(handle_ws_upgrade))
        .route("/health", get(handle_health))
        .route("/cleanup-connections", post(handle_cleanup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(config_path.as_deref())?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let state = AppState::new(config.clone());
    let _sweeper = spawn_sweeper(
        state.bridge.registry.clone(),
        state.bridge.mux.clone(),
        config.liveness.clone(),
    );

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("bridge server listening on {addr}");
    info!("  client endpoint:  POST http://{addr}/mcp");
    info!("  agent endpoint:   GET  ws://{addr}/ws");
    info!("  health check:     GET  http://{addr}/health");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

// ── JSON-RPC endpoint ───────────────────────────────────────────────────────

async fn handle_mcp(State(state): State<AppState>, Json(request): Json<Value>) -> Response {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = match request.get("method").and_then(Value::as_str) {
        Some(method) => method,
        None => {
            let body = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32600,
                    "message": "Invalid Request",
                    "data": { "message": "missing 'method' field" }
                }
            });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    // Notifications get no JSON-RPC body at all.
    if method == "notifications/initialized" {
        info!("client initialized");
        return StatusCode::NO_CONTENT.into_response();
    }

    debug!(method, "mcp request");
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    match dispatch_method(&state, method, &params).await {
        Ok(result) => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
        .into_response(),
        Err(err) => Json(rpc_error(&id, &err)).into_response(),
    }
}

async fn dispatch_method(state: &AppState, method: &str, params: &Value) -> Result<Value> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": "tabbridge",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {
                "tools": {},
                "resources": {},
            }
        })),
        "tools/list" => Ok(json!({ "tools": state.tools.list_schemas() })),
        "resources/list" => Ok(json!({
            "resources": resources::list_resources(&state.bridge.cache).await,
        })),
        "resources/read" => {
            let uri = params
                .get("uri")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidParams("missing required parameter: uri".to_string()))?;
            resources::read_resource(&state.bridge.cache, &state.bridge.config.limits, uri).await
        }
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidParams("missing tool name".to_string()))?;
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            state.tools.execute(name, &state.tool_ctx(), arguments).await
        }
        other => Err(Error::UnknownMethod(other.to_string())),
    }
}

fn rpc_error(id: &Value, err: &Error) -> Value {
    let code = err.rpc_code();
    let message = match code {
        -32601 => "Method not found",
        -32602 => "Invalid params",
        _ => "Internal error",
    };
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
            "data": { "message": err.to_string() }
        }
    })
}

// ── WebSocket, health and cleanup ───────────────────────────────────────────

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(%addr, "websocket upgrade request");
    ws.on_upgrade(move |socket| handle_socket(socket, Some(addr), state.bridge.clone()))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.bridge.registry.active_count().await;
    Json(json!({
        "status": "ok",
        "connections": connections,
        "timestamp": chrono::Utc::now(),
        "port": state.bridge.config.server.port,
    }))
}

async fn handle_cleanup(State(state): State<AppState>) -> impl IntoResponse {
    let evicted = state
        .bridge
        .registry
        .sweep_stale(state.bridge.config.liveness.stale_session(), &state.bridge.mux)
        .await;
    let active = state.bridge.registry.active_count().await;
    Json(json!({
        "status": "ok",
        "evicted": evicted,
        "activeConnections": active,
    }))
}
