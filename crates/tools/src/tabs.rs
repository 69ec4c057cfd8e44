//! `get_browser_tabs`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::Result;

use crate::{text_result, Tool, ToolCtx, ToolSchema};

pub struct BrowserTabsTool;

#[async_trait]
impl Tool for BrowserTabsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_browser_tabs",
            description: "Get information about all open browser tabs",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, ctx: &ToolCtx, _params: Value) -> Result<Value> {
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetAllTabs, None, Map::new(), None)
            .await?;
        Ok(text_result(&payload))
    }
}
