//! Wire protocol spoken with the browser agent over the WebSocket.
//!
//! All frames are JSON text. Inbound frames are discriminated by `type`,
//! outbound action frames carry an `action` name plus a server-assigned
//! `requestId` the agent must echo back in its reply.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use uuid::Uuid;

/// Closed set of actions the server can ask the agent to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "getPageContent")]
    GetPageContent,
    #[serde(rename = "getDOMSnapshot")]
    GetDomSnapshot,
    #[serde(rename = "executeScript")]
    ExecuteScript,
    #[serde(rename = "getConsoleMessages")]
    GetConsoleMessages,
    #[serde(rename = "getNetworkData")]
    GetNetworkData,
    #[serde(rename = "captureScreenshot")]
    CaptureScreenshot,
    #[serde(rename = "getPerformanceMetrics")]
    GetPerformanceMetrics,
    #[serde(rename = "getAccessibilityTree")]
    GetAccessibilityTree,
    #[serde(rename = "getAllTabs")]
    GetAllTabs,
    #[serde(rename = "attachDebugger")]
    AttachDebugger,
    #[serde(rename = "detachDebugger")]
    DetachDebugger,
    #[serde(rename = "getCookies")]
    GetCookies,
    #[serde(rename = "getStorageData")]
    GetStorageData,
    #[serde(rename = "emulateDevice")]
    EmulateDevice,
    #[serde(rename = "setUserAgent")]
    SetUserAgent,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetPageContent => "getPageContent",
            Action::GetDomSnapshot => "getDOMSnapshot",
            Action::ExecuteScript => "executeScript",
            Action::GetConsoleMessages => "getConsoleMessages",
            Action::GetNetworkData => "getNetworkData",
            Action::CaptureScreenshot => "captureScreenshot",
            Action::GetPerformanceMetrics => "getPerformanceMetrics",
            Action::GetAccessibilityTree => "getAccessibilityTree",
            Action::GetAllTabs => "getAllTabs",
            Action::AttachDebugger => "attachDebugger",
            Action::DetachDebugger => "detachDebugger",
            Action::GetCookies => "getCookies",
            Action::GetStorageData => "getStorageData",
            Action::EmulateDevice => "emulateDevice",
            Action::SetUserAgent => "setUserAgent",
        }
    }

    /// Whether a successful reply to this action seeds the snapshot cache.
    pub fn seeds_cache(&self) -> bool {
        matches!(
            self,
            Action::GetPageContent
                | Action::GetDomSnapshot
                | Action::GetConsoleMessages
                | Action::GetNetworkData
                | Action::CaptureScreenshot
                | Action::GetPerformanceMetrics
                | Action::GetAccessibilityTree
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin tag on a `browser-data` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Content,
    Devtools,
    Debugger,
}

/// One inbound frame from the agent, discriminated by `type`.
///
/// Frames that fail to deserialize (unknown `type`, malformed fields) are
/// logged and dropped by the session reader, never treated as fatal.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentFrame {
    Connection {
        #[serde(default)]
        status: Option<String>,
    },
    Ping {
        #[serde(default)]
        timestamp: Option<Value>,
    },
    Pong {
        #[serde(default)]
        timestamp: Option<Value>,
    },
    BrowserData {
        source: DataSource,
        #[serde(rename = "tabId")]
        tab_id: u32,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        data: Value,
    },
    Response {
        #[serde(rename = "requestId")]
        request_id: Uuid,
        #[serde(default)]
        data: Value,
    },
    Error {
        #[serde(rename = "requestId")]
        request_id: Uuid,
        error: String,
    },
    DevtoolsMessage {
        #[serde(rename = "tabId", default)]
        tab_id: Option<u32>,
        #[serde(default)]
        data: Value,
    },
    DebuggerEvent {
        #[serde(rename = "tabId", default)]
        tab_id: Option<u32>,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        params: Value,
    },
}

/// One outbound action request. The server is the sole generator of
/// correlation ids; an id is never reused within the process lifetime.
#[derive(Debug, Clone)]
pub struct ActionFrame {
    pub action: Action,
    pub request_id: Uuid,
    pub tab_id: Option<u32>,
    pub params: Map<String, Value>,
}

impl ActionFrame {
    pub fn new(action: Action, tab_id: Option<u32>, params: Map<String, Value>) -> Self {
        Self {
            action,
            request_id: Uuid::new_v4(),
            tab_id,
            params,
        }
    }

    /// Serialized wire form: `{action, requestId, tabId?, ...params}`.
    pub fn to_wire(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("action".to_string(), json!(self.action.as_str()));
        obj.insert("requestId".to_string(), json!(self.request_id));
        if let Some(tab_id) = self.tab_id {
            obj.insert("tabId".to_string(), json!(tab_id));
        }
        for (key, value) in &self.params {
            obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }
}

/// Liveness ping emitted by the server.
pub fn ping_frame() -> Value {
    json!({
        "type": "ping",
        "timestamp": Utc::now().timestamp_millis(),
    })
}

/// Reply to an agent-initiated ping.
pub fn pong_frame(original_timestamp: Option<&Value>) -> Value {
    json!({
        "type": "pong",
        "timestamp": Utc::now().timestamp_millis(),
        "originalTimestamp": original_timestamp.cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_frame_wire_shape() {
        let mut params = Map::new();
        params.insert("code".to_string(), json!("1 + 1"));
        let frame = ActionFrame::new(Action::ExecuteScript, Some(7), params);
        let wire = frame.to_wire();

        assert_eq!(wire["action"], "executeScript");
        assert_eq!(wire["tabId"], 7);
        assert_eq!(wire["code"], "1 + 1");
        assert!(wire["requestId"].is_string());
    }

    #[test]
    fn test_action_frame_omits_absent_tab() {
        let frame = ActionFrame::new(Action::GetAllTabs, None, Map::new());
        let wire = frame.to_wire();
        assert!(wire.get("tabId").is_none());
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = ActionFrame::new(Action::GetAllTabs, None, Map::new());
        let b = ActionFrame::new(Action::GetAllTabs, None, Map::new());
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_inbound_response_frame_parses() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"response","requestId":"{id}","data":{{"ok":true}}}}"#);
        match serde_json::from_str::<AgentFrame>(&raw) {
            Ok(AgentFrame::Response { request_id, data }) => {
                assert_eq!(request_id, id);
                assert_eq!(data["ok"], true);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_inbound_browser_data_parses() {
        let raw = r#"{"type":"browser-data","source":"content","tabId":3,"url":"https://example.com","data":{"title":"Example"}}"#;
        match serde_json::from_str::<AgentFrame>(raw) {
            Ok(AgentFrame::BrowserData { source, tab_id, url, .. }) => {
                assert_eq!(source, DataSource::Content);
                assert_eq!(tab_id, 3);
                assert_eq!(url.as_deref(), Some("https://example.com"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_frame_kind_is_a_parse_error() {
        let raw = r#"{"type":"mystery","payload":1}"#;
        assert!(serde_json::from_str::<AgentFrame>(raw).is_err());
    }

    #[test]
    fn test_pong_frame_echoes_original_timestamp() {
        let original = json!(1_700_000_000_000_u64);
        let pong = pong_frame(Some(&original));
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong["originalTimestamp"], original);
    }
}
