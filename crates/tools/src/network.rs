//! `get_network_requests` — filtered, failed-first, paginated network
//! activity with bounded body inclusion.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tabbridge_core::wire::Action;
use tabbridge_core::{Error, NetworkRequest, Result};
use tabbridge_shape::{shape_requests, BodyOptions, NetworkFilter};

use crate::{
    arg_bool, arg_scalar_or_list, arg_str, arg_u32, expired_cursor_result, page_size,
    paged_result, text_result, Tool, ToolCtx, ToolSchema,
};

pub struct NetworkRequestsTool;

#[async_trait]
impl Tool for NetworkRequestsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_network_requests",
            description: "Get network requests with multi-axis filtering, failed-first ordering and pagination",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tabId": { "type": "number", "description": "Browser tab ID" },
                    "method": { "type": "string", "description": "HTTP method filter" },
                    "status": {
                        "description": "Status code or list of status codes",
                        "oneOf": [
                            { "type": "number" },
                            { "type": "array", "items": { "type": "number" } }
                        ]
                    },
                    "resourceType": {
                        "description": "Resource type or list of resource types",
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" } }
                        ]
                    },
                    "domain": {
                        "type": "string",
                        "description": "Substring match on the request URL host"
                    },
                    "failedOnly": {
                        "type": "boolean",
                        "description": "Only requests with status >= 400 or no status",
                        "default": false
                    },
                    "includeRequestBodies": { "type": "boolean", "default": false },
                    "includeResponseBodies": { "type": "boolean", "default": false },
                    "pageSize": { "type": "number", "default": 50, "maximum": 200 },
                    "cursor": { "type": "string" }
                }
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        arg_scalar_or_list(params, "status", |v| {
            v.as_u64().and_then(|n| u16::try_from(n).ok())
        })?;
        arg_scalar_or_list(params, "resourceType", |v| v.as_str().map(str::to_string))?;
        if let Some(method) = params.get("method") {
            if !method.is_string() {
                return Err(Error::InvalidParams("method must be a string".to_string()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolCtx, params: Value) -> Result<Value> {
        let limit = page_size(&params, ctx);

        if let Some(cursor) = arg_str(&params, "cursor") {
            return Ok(match ctx.cursors.next(cursor, limit) {
                Some(page) => text_result(&paged_result(page, Value::Null, "network requests")),
                None => text_result(&expired_cursor_result("network requests")),
            });
        }

        let tab_id = arg_u32(&params, "tabId");
        let requests = self.source_requests(ctx, tab_id).await?;

        let filter = NetworkFilter {
            method: arg_str(&params, "method").map(str::to_string),
            status: arg_scalar_or_list(&params, "status", |v| {
                v.as_u64().and_then(|n| u16::try_from(n).ok())
            })?,
            resource_type: arg_scalar_or_list(&params, "resourceType", |v| {
                v.as_str().map(str::to_string)
            })?,
            domain: arg_str(&params, "domain").map(str::to_string),
            failed_only: arg_bool(&params, "failedOnly").unwrap_or(false),
        };
        let filtered = filter.apply(&requests);

        let limits = &ctx.bridge.config.limits;
        let body_opts = BodyOptions {
            include_request_bodies: arg_bool(&params, "includeRequestBodies").unwrap_or(false),
            include_response_bodies: arg_bool(&params, "includeResponseBodies").unwrap_or(false),
            max_request_body: limits.max_request_body,
            max_response_body: limits.max_response_body,
        };
        let items = shape_requests(&filtered, &body_opts);

        let page = ctx.cursors.open(items, limit);
        Ok(text_result(&paged_result(page, filter.describe(), "network requests")))
    }
}

impl NetworkRequestsTool {
    async fn source_requests(&self, ctx: &ToolCtx, tab_id: Option<u32>) -> Result<Vec<NetworkRequest>> {
        let cached = match tab_id {
            Some(id) => ctx.bridge.cache.get(id).await,
            None => ctx.bridge.cache.latest_tab().await,
        };
        if let Some(snap) = cached {
            if !snap.network_requests.is_empty() {
                return Ok(snap.network_requests.clone());
            }
        }

        let payload = ctx
            .bridge
            .mux
            .dispatch(Action::GetNetworkData, tab_id, Map::new(), None)
            .await?;
        let requests = payload.get("requests").unwrap_or(&payload);
        Ok(serde_json::from_value(requests.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_status_forms() {
        let tool = NetworkRequestsTool;
        assert!(tool.validate(&json!({"status": 404})).is_ok());
        assert!(tool.validate(&json!({"status": [404, 500]})).is_ok());
        assert!(tool.validate(&json!({"status": "bad"})).is_err());
        assert!(tool.validate(&json!({"method": 5})).is_err());
    }
}
