use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use tabbridge_core::{Error, Result};

use crate::console::ConsoleMessagesTool;
use crate::debugger::{AttachDebuggerTool, DetachDebuggerTool};
use crate::device::{CookiesTool, EmulateDeviceTool, SetUserAgentTool, StorageDataTool};
use crate::dom_snapshot::DomSnapshotTool;
use crate::javascript::ExecuteJavaScriptTool;
use crate::metrics::{AccessibilityTreeTool, PerformanceMetricsTool};
use crate::network::NetworkRequestsTool;
use crate::page_content::PageContentTool;
use crate::screenshot::ScreenshotTool;
use crate::tabs::BrowserTabsTool;
use crate::{Tool, ToolCtx};

#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Page inspection
        registry.register(Arc::new(PageContentTool));
        registry.register(Arc::new(DomSnapshotTool));
        registry.register(Arc::new(ScreenshotTool));

        // Diagnostics
        registry.register(Arc::new(ConsoleMessagesTool));
        registry.register(Arc::new(NetworkRequestsTool));
        registry.register(Arc::new(PerformanceMetricsTool));
        registry.register(Arc::new(AccessibilityTreeTool));

        // Browser control
        registry.register(Arc::new(ExecuteJavaScriptTool));
        registry.register(Arc::new(BrowserTabsTool));
        registry.register(Arc::new(AttachDebuggerTool));
        registry.register(Arc::new(DetachDebuggerTool));

        // Browser state
        registry.register(Arc::new(CookiesTool));
        registry.register(Arc::new(StorageDataTool));
        registry.register(Arc::new(EmulateDeviceTool));
        registry.register(Arc::new(SetUserAgentTool));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        debug!(name = schema.name, "registering tool");
        self.tools.insert(schema.name.to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Descriptors for `tools/list`, sorted by name for a stable listing.
    pub fn list_schemas(&self) -> Vec<Value> {
        let mut schemas: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "name": schema.name,
                    "description": schema.description,
                    "inputSchema": schema.input_schema,
                })
            })
            .collect();
        schemas.sort_by(|a, b| {
            a["name"]
                .as_str()
                .unwrap_or_default()
                .cmp(b["name"].as_str().unwrap_or_default())
        });
        schemas
    }

    pub async fn execute(&self, name: &str, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("unknown tool: {name}")))?;

        if let Err(err) = tool.validate(&params) {
            warn!(tool = name, error = %err, "tool validation failed");
            return Err(err);
        }

        debug!(tool = name, "executing tool");
        tool.execute(ctx, params).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_the_client_surface() {
        let registry = ToolRegistry::with_defaults();
        let names = registry.tool_names();
        for expected in [
            "get_page_content",
            "get_dom_snapshot",
            "get_console_messages",
            "get_network_requests",
            "capture_screenshot",
            "execute_javascript",
            "get_performance_metrics",
            "get_accessibility_tree",
            "get_browser_tabs",
            "attach_debugger",
            "detach_debugger",
            "get_cookies",
            "get_storage_data",
            "emulate_device",
            "set_user_agent",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn test_list_schemas_is_sorted_and_complete() {
        let registry = ToolRegistry::with_defaults();
        let schemas = registry.list_schemas();
        assert_eq!(schemas.len(), 15);
        let names: Vec<&str> = schemas.iter().filter_map(|s| s["name"].as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for schema in &schemas {
            assert!(schema["description"].is_string());
            assert_eq!(schema["inputSchema"]["type"], "object");
        }
    }
}
