//! `execute_javascript` — run a script in the page context.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::Result;

use crate::{arg_u32, required_str, text_result, Tool, ToolCtx, ToolSchema};

pub struct ExecuteJavaScriptTool;

#[async_trait]
impl Tool for ExecuteJavaScriptTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "execute_javascript",
            description: "Execute JavaScript code in the browser page context",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "code": { "type": "string", "description": "JavaScript code to execute" }
                },
                "required": ["code"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "code")?;
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let code = required_str(&params, "code")?;

        let mut action_params = Map::new();
        action_params.insert("code".to_string(), json!(code));
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::ExecuteScript, tab_id, action_params, None)
            .await?;
        Ok(text_result(&payload))
    }
}
