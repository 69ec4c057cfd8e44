//! `get_performance_metrics` and `get_accessibility_tree`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::{Error, Result};

use crate::{arg_u32, arg_u64, text_result, Tool, ToolCtx, ToolSchema};

pub struct PerformanceMetricsTool;

#[async_trait]
impl Tool for PerformanceMetricsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_performance_metrics",
            description: "Get navigation timing, core web vitals and memory usage for the page",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" }
                }
            }),
        }
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetPerformanceMetrics, tab_id, Map::new(), None)
            .await?;
        Ok(text_result(&payload))
    }
}

const MIN_A11Y_TIMEOUT_MS: u64 = 5_000;
const MAX_A11Y_TIMEOUT_MS: u64 = 120_000;

pub struct AccessibilityTreeTool;

#[async_trait]
impl Tool for AccessibilityTreeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_accessibility_tree",
            description: "Get the accessibility tree for the page. Extraction can be slow on large pages",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "timeout": {
                        "type": "number",
                        "description": "Reply deadline in milliseconds",
                        "minimum": MIN_A11Y_TIMEOUT_MS,
                        "maximum": MAX_A11Y_TIMEOUT_MS
                    }
                }
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(timeout) = params.get("timeout") {
            match timeout.as_u64() {
                Some(ms) if (MIN_A11Y_TIMEOUT_MS..=MAX_A11Y_TIMEOUT_MS).contains(&ms) => {}
                _ => {
                    return Err(Error::InvalidParams(format!(
                        "timeout must be in [{MIN_A11Y_TIMEOUT_MS}, {MAX_A11Y_TIMEOUT_MS}] ms"
                    )))
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let timeout_ms = arg_u64(&params, "timeout");
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetAccessibilityTree, tab_id, Map::new(), timeout_ms)
            .await?;
        Ok(text_result(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessibility_timeout_range() {
        let tool = AccessibilityTreeTool;
        assert!(tool.validate(&json!({"timeout": 5000})).is_ok());
        assert!(tool.validate(&json!({"timeout": 120000})).is_ok());
        assert!(tool.validate(&json!({"timeout": 1000})).is_err());
        assert!(tool.validate(&json!({"timeout": 500000})).is_err());
        assert!(tool.validate(&json!({})).is_ok());
    }
}
