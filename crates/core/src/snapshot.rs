//! Cached browser data records.
//!
//! A [`TabSnapshot`] is the last-seen data for one browser tab. Records are
//! immutable once published; every update installs a whole new record, so
//! readers never observe a half-written snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    #[serde(default)]
    pub level: String,
    #[serde(default, alias = "message")]
    pub text: String,
    /// Milliseconds since the Unix epoch, as emitted by the browser.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl NetworkRequest {
    /// Failed means an error status or no status at all (aborted/unreachable).
    pub fn is_failed(&self) -> bool {
        match self.status {
            None | Some(0) => true,
            Some(code) => code >= 400,
        }
    }
}

/// One node of a serialized DOM tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
    #[serde(default)]
    pub tag: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DomNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<HashMap<String, String>>,
    /// Set on placeholder nodes inserted where a tree walk stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_siblings: Option<usize>,
}

impl DomNode {
    pub fn placeholder(remaining_siblings: usize) -> Self {
        Self {
            truncated: Some(true),
            remaining_siblings: Some(remaining_siblings),
            ..Self::default()
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DomNode::node_count).sum::<usize>()
    }
}

/// Last-seen data for one browser tab, keyed by the browser-assigned tab id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub tab_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_content: Option<PageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot: Option<DomNode>,
    pub console_messages: Vec<ConsoleMessage>,
    pub network_requests: Vec<NetworkRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessibility_tree: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Value>,
    /// Most recent debugger/devtools events, oldest dropped on overflow.
    pub debugger_events: VecDeque<Value>,
    pub last_updated: DateTime<Utc>,
}

impl TabSnapshot {
    pub fn new(tab_id: u32) -> Self {
        Self {
            tab_id,
            url: None,
            title: None,
            page_content: None,
            dom_snapshot: None,
            console_messages: Vec::new(),
            network_requests: Vec::new(),
            performance_metrics: None,
            accessibility_tree: None,
            screenshot: None,
            debugger_events: VecDeque::new(),
            last_updated: Utc::now(),
        }
    }

    /// Resource kinds currently readable for this tab.
    pub fn available_resources(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.page_content.is_some() {
            kinds.push("content");
        }
        if self.dom_snapshot.is_some() {
            kinds.push("dom");
        }
        if !self.console_messages.is_empty() {
            kinds.push("console");
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_request_failed_classification() {
        let ok = NetworkRequest {
            status: Some(200),
            ..NetworkRequest::default()
        };
        let not_found = NetworkRequest {
            status: Some(404),
            ..NetworkRequest::default()
        };
        let aborted = NetworkRequest {
            status: None,
            ..NetworkRequest::default()
        };
        let zero = NetworkRequest {
            status: Some(0),
            ..NetworkRequest::default()
        };
        assert!(!ok.is_failed());
        assert!(not_found.is_failed());
        assert!(aborted.is_failed());
        assert!(zero.is_failed());
    }

    #[test]
    fn test_console_message_accepts_message_alias() {
        let msg: ConsoleMessage =
            serde_json::from_str(r#"{"level":"error","message":"boom","timestamp":12}"#).unwrap();
        assert_eq!(msg.text, "boom");
    }

    #[test]
    fn test_dom_node_count() {
        let tree: DomNode = serde_json::from_value(serde_json::json!({
            "tag": "div",
            "children": [
                {"tag": "p", "children": [{"tag": "span"}]},
                {"tag": "p"}
            ]
        }))
        .unwrap();
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_available_resources() {
        let mut snap = TabSnapshot::new(1);
        assert!(snap.available_resources().is_empty());
        snap.page_content = Some(PageContent::default());
        snap.console_messages.push(ConsoleMessage::default());
        assert_eq!(snap.available_resources(), vec!["content", "console"]);
    }
}
