//! `attach_debugger` / `detach_debugger`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::Result;

use crate::{required_u32, text_result, Tool, ToolCtx, ToolSchema};

fn tab_only_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tabId": { "type": "number", "description": "Browser tab ID" }
        },
        "required": ["tabId"]
    })
}

async fn run_debugger_action(ctx: &ToolCtx, params: &Value, action: Action) -> Result<Value> {
    let tab_id = required_u32(params, "tabId")?;
    let payload = ctx
        .bridge
        .mux
        .dispatch(action, Some(tab_id), Map::new(), None)
        .await?;
    let success = payload.get("success").and_then(Value::as_bool).unwrap_or(true);
    Ok(text_result(&json!({
        "success": success,
        "tabId": tab_id,
    })))
}

pub struct AttachDebuggerTool;

#[async_trait]
impl Tool for AttachDebuggerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "attach_debugger",
            description: "Attach the debugger to a browser tab",
            input_schema: tab_only_schema(),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_u32(params, "tabId").map(|_| ())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        run_debugger_action(ctx, &params, Action::AttachDebugger).await
    }
}

pub struct DetachDebuggerTool;

#[async_trait]
impl Tool for DetachDebuggerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "detach_debugger",
            description: "Detach the debugger from a browser tab",
            input_schema: tab_only_schema(),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_u32(params, "tabId").map(|_| ())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        run_debugger_action(ctx, &params, Action::DetachDebugger).await
    }
}
