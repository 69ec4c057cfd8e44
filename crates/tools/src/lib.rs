pub mod console;
pub mod debugger;
pub mod device;
pub mod dom_snapshot;
pub mod javascript;
pub mod metrics;
pub mod network;
pub mod page_content;
pub mod registry;
pub mod resources;
pub mod screenshot;
pub mod tabs;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use tabbridge_core::{Error, Result};
use tabbridge_session::BridgeState;
use tabbridge_shape::{CursorStore, Page};

pub use registry::ToolRegistry;

/// Everything a tool needs to run: the bridge (multiplexer, snapshot cache,
/// config) and the shared pagination cursor store.
#[derive(Clone)]
pub struct ToolCtx {
    pub bridge: Arc<BridgeState>,
    pub cursors: Arc<CursorStore>,
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    /// Run the tool and return the MCP tool-call result
    /// (`{content: [...]}`) ready for the JSON-RPC layer.
    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value>;
}

// ── Shared argument helpers ─────────────────────────────────────────────────

pub(crate) fn arg_u32(params: &Value, key: &str) -> Option<u32> {
    params.get(key).and_then(Value::as_u64).map(|v| v as u32)
}

pub(crate) fn arg_u64(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

pub(crate) fn arg_usize(params: &Value, key: &str) -> Option<usize> {
    params.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

pub(crate) fn arg_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

pub(crate) fn arg_bool(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(Value::as_bool)
}

/// Accept a scalar or a list for set-valued filters like `status`.
pub(crate) fn arg_scalar_or_list<T, F>(params: &Value, key: &str, convert: F) -> Result<Option<Vec<T>>>
where
    F: Fn(&Value) -> Option<T>,
{
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let converted: Option<Vec<T>> = items.iter().map(&convert).collect();
            converted
                .map(Some)
                .ok_or_else(|| Error::InvalidParams(format!("invalid entry in '{key}' list")))
        }
        Some(single) => match convert(single) {
            Some(v) => Ok(Some(vec![v])),
            None => Err(Error::InvalidParams(format!("invalid value for '{key}'"))),
        },
    }
}

pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    arg_str(params, key)
        .ok_or_else(|| Error::InvalidParams(format!("missing required parameter: {key}")))
}

pub(crate) fn required_u32(params: &Value, key: &str) -> Result<u32> {
    arg_u32(params, key)
        .ok_or_else(|| Error::InvalidParams(format!("missing required parameter: {key}")))
}

/// Requested page size clamped into [1, maxPageSize].
pub(crate) fn page_size(params: &Value, ctx: &ToolCtx) -> usize {
    let limits = &ctx.bridge.config.limits;
    arg_usize(params, "pageSize")
        .unwrap_or(limits.default_page_size)
        .clamp(1, limits.max_page_size)
}

// ── Shared result builders ──────────────────────────────────────────────────

/// MCP text content wrapping a JSON value.
pub fn text_result(value: &Value) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string_pretty(value).unwrap_or_default(),
        }]
    })
}

/// Envelope every paginated tool returns.
pub fn paged_result(page: Page, filters: Value, noun: &str) -> Value {
    let count = page.items.len();
    let message = if page.has_more {
        format!(
            "{count} of {total} {noun} (more available; pass nextCursor to continue)",
            total = page.total
        )
    } else {
        format!("{count} of {total} {noun}", total = page.total)
    };
    json!({
        "data": page.items,
        "count": count,
        "total": page.total,
        "hasMore": page.has_more,
        "nextCursor": page.next_cursor,
        "filters": filters,
        "message": message,
    })
}

/// Defined "start over" reply for an unknown or expired cursor.
pub fn expired_cursor_result(noun: &str) -> Value {
    json!({
        "data": [],
        "count": 0,
        "total": 0,
        "hasMore": false,
        "nextCursor": null,
        "filters": null,
        "message": format!("cursor expired or unknown; re-issue the {noun} query without a cursor"),
    })
}
