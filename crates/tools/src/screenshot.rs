//! `capture_screenshot` — returned as MCP image content.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::{Error, Result};

use crate::{arg_str, arg_u32, arg_u64, text_result, Tool, ToolCtx, ToolSchema};

pub struct ScreenshotTool;

#[async_trait]
impl Tool for ScreenshotTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "capture_screenshot",
            description: "Capture a screenshot of the current page",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "format": {
                        "type": "string",
                        "enum": ["png", "jpeg"],
                        "default": "png"
                    },
                    "quality": {
                        "type": "number",
                        "description": "JPEG quality, 0-100",
                        "minimum": 0,
                        "maximum": 100
                    }
                }
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(format) = arg_str(params, "format") {
            if format != "png" && format != "jpeg" {
                return Err(Error::InvalidParams(format!(
                    "format must be 'png' or 'jpeg', got '{format}'"
                )));
            }
        }
        if let Some(quality) = params.get("quality") {
            match quality.as_u64() {
                Some(q) if q <= 100 => {}
                _ => {
                    return Err(Error::InvalidParams(
                        "quality must be an integer in [0, 100]".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let format = arg_str(&params, "format").unwrap_or("png").to_string();

        let mut action_params = Map::new();
        action_params.insert("format".to_string(), json!(format));
        if let Some(quality) = arg_u64(&params, "quality") {
            action_params.insert("quality".to_string(), json!(quality));
        }

        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::CaptureScreenshot, tab_id, action_params, None)
            .await?;

        let mime_type = match format.as_str() {
            "jpeg" => "image/jpeg",
            _ => "image/png",
        };
        match payload.get("data").and_then(Value::as_str) {
            Some(data) => Ok(json!({
                "content": [{
                    "type": "image",
                    "data": data,
                    "mimeType": mime_type,
                }]
            })),
            None => Ok(text_result(&payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_format_and_quality() {
        let tool = ScreenshotTool;
        assert!(tool.validate(&json!({"format": "png"})).is_ok());
        assert!(tool.validate(&json!({"format": "webp"})).is_err());
        assert!(tool.validate(&json!({"quality": 80})).is_ok());
        assert!(tool.validate(&json!({"quality": 150})).is_err());
        assert!(tool.validate(&json!({"quality": -2})).is_err());
    }
}
