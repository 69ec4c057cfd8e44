//! `get_page_content` — extracted page text and optional HTML, bounded.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::{PageContent, Result};
use tabbridge_shape::truncate_text;

use crate::{arg_bool, arg_u32, arg_usize, text_result, Tool, ToolCtx, ToolSchema};

pub struct PageContentTool;

#[async_trait]
impl Tool for PageContentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_page_content",
            description: "Get the extracted text content and metadata of a web page",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": {
                        "type": "number",
                        "description": "Browser tab ID (uses the most recently active tab if omitted)"
                    },
                    "includeMetadata": {
                        "type": "boolean",
                        "description": "Include page metadata such as meta tags",
                        "default": true
                    },
                    "includeHtml": {
                        "type": "boolean",
                        "description": "Include the raw HTML alongside the extracted text",
                        "default": false
                    },
                    "maxTextLength": {
                        "type": "number",
                        "description": "Truncate the extracted text to this many characters",
                        "default": 30000
                    }
                }
            }),
        }
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let include_metadata = arg_bool(&params, "includeMetadata").unwrap_or(true);
        let include_html = arg_bool(&params, "includeHtml").unwrap_or(false);
        let limits = &ctx.bridge.config.limits;
        let max_text = arg_usize(&params, "maxTextLength").unwrap_or(limits.max_text);

        let mut action_params = Map::new();
        action_params.insert("includeMetadata".to_string(), json!(include_metadata));
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetPageContent, tab_id, action_params, None)
            .await?;

        let page: PageContent = serde_json::from_value(payload.clone()).unwrap_or_default();
        let text = truncate_text(&page.text, max_text);

        let mut result = json!({
            "url": page.url,
            "title": page.title,
            "text": text.text,
            "textLength": text.original_len,
            "textTruncated": text.truncated,
        });
        if include_metadata {
            result["metadata"] = Value::Object(page.metadata);
        }
        if include_html {
            let html = truncate_text(&page.html, limits.max_html);
            result["html"] = json!(html.text);
            result["htmlLength"] = json!(html.original_len);
            result["htmlTruncated"] = json!(html.truncated);
        }
        Ok(text_result(&result))
    }
}
