//! `get_console_messages` — filtered, paginated console output.
//!
//! Served from the snapshot cache when the tab has buffered messages (the
//! agent pushes them continuously); falls back to one agent round-trip
//! otherwise.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::{ConsoleMessage, Error, Result};
use tabbridge_shape::ConsoleFilter;

use crate::{
    arg_str, arg_u32, expired_cursor_result, page_size, paged_result, text_result, Tool, ToolCtx,
    ToolSchema,
};

const KNOWN_LEVELS: [&str; 5] = ["error", "warn", "info", "log", "debug"];

pub struct ConsoleMessagesTool;

#[async_trait]
impl Tool for ConsoleMessagesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_console_messages",
            description: "Get console messages, filtered by level, text and time, with pagination",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "logLevels": {
                        "type": "array",
                        "items": { "type": "string", "enum": KNOWN_LEVELS },
                        "description": "Levels to include",
                        "default": ["error", "warn"]
                    },
                    "searchTerm": {
                        "type": "string",
                        "description": "Case-insensitive substring match on the message text"
                    },
                    "since": {
                        "type": "number",
                        "description": "Keep messages with timestamp >= since (epoch milliseconds)"
                    },
                    "pageSize": { "type": "number", "default": 50, "maximum": 200 },
                    "cursor": {
                        "type": "string",
                        "description": "Continuation cursor from a previous page"
                    }
                }
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(levels) = params.get("logLevels") {
            let entries = levels
                .as_array()
                .ok_or_else(|| Error::InvalidParams("logLevels must be an array".to_string()))?;
            for entry in entries {
                let level = entry
                    .as_str()
                    .ok_or_else(|| Error::InvalidParams("logLevels entries must be strings".to_string()))?;
                if !KNOWN_LEVELS.contains(&level) {
                    return Err(Error::InvalidParams(format!("unknown log level '{level}'")));
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let limit = page_size(&params, ctx);

        if let Some(cursor) = arg_str(&params, "cursor") {
            return Ok(match ctx.cursors.next(cursor, limit) {
                Some(page) => text_result(&paged_result(page, Value::Null, "console messages")),
                None => text_result(&expired_cursor_result("console messages")),
            });
        }

        let tab_id = arg_u32(&params, "tabId");
        let messages = self.source_messages(ctx, tab_id).await?;

        let filter = ConsoleFilter {
            levels: Some(
                params
                    .get("logLevels")
                    .and_then(Value::as_array)
                    .map(|levels| {
                        levels
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_else(|| vec!["error".to_string(), "warn".to_string()]),
            ),
            search_term: arg_str(&params, "searchTerm").map(str::to_string),
            since: params.get("since").and_then(Value::as_i64),
        };
        let filtered = filter.apply(&messages);

        let items: Vec<Value> = filtered
            .iter()
            .filter_map(|m| serde_json::to_value(m).ok())
            .collect();
        let page = ctx.cursors.open(items, limit);
        Ok(text_result(&paged_result(page, filter.describe(), "console messages")))
    }
}

impl ConsoleMessagesTool {
    async fn source_messages(&self, ctx: &ToolCtx, tab_id: Option<u32>) -> Result<Vec<ConsoleMessage>> {
        let cached = match tab_id {
            Some(id) => ctx.bridge.cache.get(id).await,
            None => ctx.bridge.cache.latest_tab().await,
        };
        if let Some(snap) = cached {
            if !snap.console_messages.is_empty() {
                return Ok(snap.console_messages.clone());
            }
        }

        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetConsoleMessages, tab_id, Map::new(), None)
            .await?;
        let messages = payload.get("messages").unwrap_or(&payload);
        Ok(serde_json::from_value(messages.clone()).unwrap_or_default())
    }
}
