//! Browser-state tools: cookies, storage, device emulation, user agent.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::{Error, Result};

use crate::{arg_str, arg_u32, required_str, text_result, Tool, ToolCtx, ToolSchema};

pub struct CookiesTool;

#[async_trait]
impl Tool for CookiesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_cookies",
            description: "Get cookies visible to the page",
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
            .dispatch(Action::GetCookies, tab_id, Map::new(), None)
            .await?;
        Ok(text_result(&payload))
    }
}

pub struct StorageDataTool;

#[async_trait]
impl Tool for StorageDataTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_storage_data",
            description: "Get localStorage or sessionStorage entries for the page",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "storageType": {
                        "type": "string",
                        "enum": ["local", "session"],
                        "default": "local"
                    }
                }
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(kind) = arg_str(params, "storageType") {
            if kind != "local" && kind != "session" {
                return Err(Error::InvalidParams(format!(
                    "storageType must be 'local' or 'session', got '{kind}'"
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let mut action_params = Map::new();
        action_params.insert(
            "storageType".to_string(),
            json!(arg_str(&params, "storageType").unwrap_or("local")),
        );
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetStorageData, tab_id, action_params, None)
            .await?;
        Ok(text_result(&payload))
    }
}

pub struct EmulateDeviceTool;

#[async_trait]
impl Tool for EmulateDeviceTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "emulate_device",
            description: "Override viewport metrics for the page",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "deviceScaleFactor": { "type": "number", "default": 1.0 },
                    "mobile": { "type": "boolean", "default": false }
                },
                "required": ["width", "height"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        for key in ["width", "height"] {
            match params.get(key).and_then(Value::as_u64) {
                Some(v) if v > 0 => {}
                _ => {
                    return Err(Error::InvalidParams(format!(
                        "{key} must be a positive integer"
                    )))
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let mut action_params = Map::new();
        for key in ["width", "height", "deviceScaleFactor", "mobile"] {
            if let Some(value) = params.get(key) {
                action_params.insert(key.to_string(), value.clone());
            }
        }
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::EmulateDevice, tab_id, action_params, None)
            .await?;
        Ok(text_result(&payload))
    }
}

pub struct SetUserAgentTool;

#[async_trait]
impl Tool for SetUserAgentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "set_user_agent",
            description: "Override the user agent string for the page",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "userAgent": { "type": "string" }
                },
                "required": ["userAgent"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "userAgent").map(|_| ())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let tab_id = arg_u32(&params, "tabId");
        let mut action_params = Map::new();
        action_params.insert(
            "userAgent".to_string(),
            json!(required_str(&params, "userAgent")?),
        );
        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::SetUserAgent, tab_id, action_params, None)
            .await?;
        Ok(text_result(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_validation() {
        let tool = StorageDataTool;
        assert!(tool.validate(&json!({"storageType": "local"})).is_ok());
        assert!(tool.validate(&json!({"storageType": "indexeddb"})).is_err());
        assert!(tool.validate(&json!({})).is_ok());
    }

    #[test]
    fn test_emulate_device_requires_dimensions() {
        let tool = EmulateDeviceTool;
        assert!(tool.validate(&json!({"width": 390, "height": 844})).is_ok());
        assert!(tool.validate(&json!({"width": 390})).is_err());
        assert!(tool.validate(&json!({"width": 0, "height": 10})).is_err());
    }

    #[test]
    fn test_set_user_agent_required() {
        let tool = SetUserAgentTool;
        assert!(tool.validate(&json!({"userAgent": "UA/1.0"})).is_ok());
        assert!(tool.validate(&json!({})).is_err());
    }
}
