//! Per-tab snapshot cache.
//!
//! The mapping is owned here exclusively; writers install a whole new
//! immutable record per update, so concurrent readers hold an `Arc` to
//! either the prior or the new snapshot, never a mixture.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use tabbridge_core::config::LimitsConfig;
use tabbridge_core::snapshot::{ConsoleMessage, DomNode, NetworkRequest, PageContent, TabSnapshot};
use tabbridge_core::wire::{Action, DataSource};

pub struct SnapshotCache {
    tabs: RwLock<HashMap<u32, Arc<TabSnapshot>>>,
    console_cap: usize,
    network_cap: usize,
    debugger_cap: usize,
}

impl SnapshotCache {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            tabs: RwLock::new(HashMap::new()),
            console_cap: limits.console_buffer,
            network_cap: limits.network_buffer,
            debugger_cap: limits.debugger_buffer,
        }
    }

    pub async fn get(&self, tab_id: u32) -> Option<Arc<TabSnapshot>> {
        self.tabs.read().await.get(&tab_id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<TabSnapshot>> {
        self.tabs.read().await.values().cloned().collect()
    }

    /// Tab with the most recent update, used when a caller names no tab.
    pub async fn latest_tab(&self) -> Option<Arc<TabSnapshot>> {
        self.tabs
            .read()
            .await
            .values()
            .max_by_key(|s| s.last_updated)
            .cloned()
    }

    /// Enumeration feeding `resources/list`: one entry per tab, with the
    /// resource kinds currently present.
    pub async fn list_available(&self) -> Vec<(u32, Vec<&'static str>)> {
        let mut tabs: Vec<(u32, Vec<&'static str>)> = self
            .tabs
            .read()
            .await
            .values()
            .map(|s| (s.tab_id, s.available_resources()))
            .filter(|(_, kinds)| !kinds.is_empty())
            .collect();
        tabs.sort_by_key(|(id, _)| *id);
        tabs
    }

    pub async fn tab_count(&self) -> usize {
        self.tabs.read().await.len()
    }

    pub async fn clear(&self) {
        self.tabs.write().await.clear();
    }

    /// Merge a `browser-data` push from the agent.
    pub async fn apply_content_update(
        &self,
        tab_id: u32,
        source: DataSource,
        url: Option<String>,
        data: &Value,
    ) {
        match source {
            DataSource::Content => {
                self.update(tab_id, |snap| {
                    if let Some(u) = &url {
                        snap.url = Some(u.clone());
                    }
                    if let Some(title) = data.get("title").and_then(Value::as_str) {
                        snap.title = Some(title.to_string());
                    }
                    if let Some(content) = data.get("pageContent") {
                        if let Ok(page) = serde_json::from_value::<PageContent>(content.clone()) {
                            if snap.url.is_none() && !page.url.is_empty() {
                                snap.url = Some(page.url.clone());
                            }
                            if snap.title.is_none() && !page.title.is_empty() {
                                snap.title = Some(page.title.clone());
                            }
                            snap.page_content = Some(page);
                        }
                    }
                    if let Some(dom) = data.get("domSnapshot") {
                        if let Ok(node) = serde_json::from_value::<DomNode>(dom.clone()) {
                            snap.dom_snapshot = Some(node);
                        }
                    }
                    if let Some(messages) = data.get("consoleMessages") {
                        append_console(snap, messages, self.console_cap);
                    }
                    if let Some(requests) = data.get("networkRequests") {
                        append_network(snap, requests, self.network_cap);
                    }
                    if let Some(metrics) = data.get("performanceMetrics") {
                        snap.performance_metrics = Some(metrics.clone());
                    }
                    if let Some(tree) = data.get("accessibilityTree") {
                        snap.accessibility_tree = Some(tree.clone());
                    }
                })
                .await;
            }
            DataSource::Devtools | DataSource::Debugger => {
                self.push_debugger_event(tab_id, data.clone()).await;
            }
        }
    }

    /// Ancillary devtools/debugger event, kept in a bounded ring.
    pub async fn push_debugger_event(&self, tab_id: u32, event: Value) {
        let cap = self.debugger_cap;
        self.update(tab_id, |snap| {
            snap.debugger_events.push_back(event);
            while snap.debugger_events.len() > cap {
                snap.debugger_events.pop_front();
            }
        })
        .await;
    }

    /// Seed the cache from a successful action reply.
    pub async fn apply_action_reply(&self, tab_id: u32, action: Action, payload: &Value) {
        match action {
            Action::GetPageContent => {
                if let Ok(page) = serde_json::from_value::<PageContent>(payload.clone()) {
                    self.update(tab_id, |snap| {
                        if !page.url.is_empty() {
                            snap.url = Some(page.url.clone());
                        }
                        if !page.title.is_empty() {
                            snap.title = Some(page.title.clone());
                        }
                        snap.page_content = Some(page);
                    })
                    .await;
                }
            }
            Action::GetDomSnapshot => {
                let root = payload.get("root").unwrap_or(payload);
                if let Ok(node) = serde_json::from_value::<DomNode>(root.clone()) {
                    self.update(tab_id, |snap| snap.dom_snapshot = Some(node)).await;
                }
            }
            Action::GetConsoleMessages => {
                let messages = payload.get("messages").unwrap_or(payload);
                if let Ok(parsed) = serde_json::from_value::<Vec<ConsoleMessage>>(messages.clone()) {
                    let cap = self.console_cap;
                    self.update(tab_id, |snap| {
                        snap.console_messages = parsed;
                        let len = snap.console_messages.len();
                        if len > cap {
                            snap.console_messages.drain(..len - cap);
                        }
                    })
                    .await;
                }
            }
            Action::GetNetworkData => {
                let requests = payload.get("requests").unwrap_or(payload);
                if let Ok(parsed) = serde_json::from_value::<Vec<NetworkRequest>>(requests.clone()) {
                    let cap = self.network_cap;
                    self.update(tab_id, |snap| {
                        snap.network_requests = parsed;
                        let len = snap.network_requests.len();
                        if len > cap {
                            snap.network_requests.drain(..len - cap);
                        }
                    })
                    .await;
                }
            }
            Action::GetPerformanceMetrics => {
                let payload = payload.clone();
                self.update(tab_id, |snap| snap.performance_metrics = Some(payload)).await;
            }
            Action::GetAccessibilityTree => {
                let payload = payload.clone();
                self.update(tab_id, |snap| snap.accessibility_tree = Some(payload)).await;
            }
            Action::CaptureScreenshot => {
                let payload = payload.clone();
                self.update(tab_id, |snap| snap.screenshot = Some(payload)).await;
            }
            _ => {
                debug!(action = %action, tab_id, "action reply does not seed the cache");
            }
        }
    }

    /// Clone-modify-install: the new record replaces the old one atomically
    /// under the write lock, readers keep whichever Arc they already hold.
    async fn update<F>(&self, tab_id: u32, mutate: F)
    where
        F: FnOnce(&mut TabSnapshot),
    {
        let mut tabs = self.tabs.write().await;
        let mut snap = tabs
            .get(&tab_id)
            .map(|existing| (**existing).clone())
            .unwrap_or_else(|| TabSnapshot::new(tab_id));
        mutate(&mut snap);
        snap.last_updated = chrono::Utc::now();
        tabs.insert(tab_id, Arc::new(snap));
    }
}

fn append_console(snap: &mut TabSnapshot, messages: &Value, cap: usize) {
    if let Ok(mut parsed) = serde_json::from_value::<Vec<ConsoleMessage>>(messages.clone()) {
        snap.console_messages.append(&mut parsed);
        let len = snap.console_messages.len();
        if len > cap {
            snap.console_messages.drain(..len - cap);
        }
    }
}

fn append_network(snap: &mut TabSnapshot, requests: &Value, cap: usize) {
    if let Ok(mut parsed) = serde_json::from_value::<Vec<NetworkRequest>>(requests.clone()) {
        snap.network_requests.append(&mut parsed);
        let len = snap.network_requests.len();
        if len > cap {
            snap.network_requests.drain(..len - cap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> SnapshotCache {
        SnapshotCache::new(&LimitsConfig::default())
    }

    #[tokio::test]
    async fn test_content_update_creates_tab_lazily() {
        let cache = cache();
        assert!(cache.get(7).await.is_none());
        cache
            .apply_content_update(
                7,
                DataSource::Content,
                Some("https://example.com".to_string()),
                &json!({"title": "Example"}),
            )
            .await;
        let snap = cache.get(7).await.unwrap();
        assert_eq!(snap.url.as_deref(), Some("https://example.com"));
        assert_eq!(snap.title.as_deref(), Some("Example"));
    }

    #[tokio::test]
    async fn test_update_replaces_whole_record() {
        let cache = cache();
        cache
            .apply_content_update(1, DataSource::Content, None, &json!({"title": "one"}))
            .await;
        let before = cache.get(1).await.unwrap();
        cache
            .apply_content_update(1, DataSource::Content, None, &json!({"title": "two"}))
            .await;
        // The reader's old Arc still sees the old record.
        assert_eq!(before.title.as_deref(), Some("one"));
        assert_eq!(cache.get(1).await.unwrap().title.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_console_buffer_appends_and_caps() {
        let limits = LimitsConfig {
            console_buffer: 5,
            ..LimitsConfig::default()
        };
        let cache = SnapshotCache::new(&limits);
        for i in 0..8 {
            cache
                .apply_content_update(
                    1,
                    DataSource::Content,
                    None,
                    &json!({"consoleMessages": [{"level": "error", "text": format!("m{i}"), "timestamp": i}]}),
                )
                .await;
        }
        let snap = cache.get(1).await.unwrap();
        assert_eq!(snap.console_messages.len(), 5);
        assert_eq!(snap.console_messages[0].text, "m3");
        assert_eq!(snap.console_messages[4].text, "m7");
    }

    #[tokio::test]
    async fn test_debugger_ring_caps_at_limit() {
        let cache = cache();
        for i in 0..150 {
            cache.push_debugger_event(2, json!({"seq": i})).await;
        }
        let snap = cache.get(2).await.unwrap();
        assert_eq!(snap.debugger_events.len(), 100);
        assert_eq!(snap.debugger_events.front().unwrap()["seq"], 50);
        assert_eq!(snap.debugger_events.back().unwrap()["seq"], 149);
    }

    #[tokio::test]
    async fn test_devtools_source_feeds_the_ring() {
        let cache = cache();
        cache
            .apply_content_update(3, DataSource::Devtools, None, &json!({"method": "Network.x"}))
            .await;
        let snap = cache.get(3).await.unwrap();
        assert_eq!(snap.debugger_events.len(), 1);
    }

    #[tokio::test]
    async fn test_action_reply_seeds_page_content() {
        let cache = cache();
        cache
            .apply_action_reply(
                5,
                Action::GetPageContent,
                &json!({"url": "https://a.dev", "title": "A", "text": "hello", "html": "<p>hello</p>"}),
            )
            .await;
        let snap = cache.get(5).await.unwrap();
        assert_eq!(snap.page_content.as_ref().unwrap().text, "hello");
        assert_eq!(snap.url.as_deref(), Some("https://a.dev"));
    }

    #[tokio::test]
    async fn test_action_reply_seeds_dom_under_root_key() {
        let cache = cache();
        cache
            .apply_action_reply(
                5,
                Action::GetDomSnapshot,
                &json!({"root": {"tag": "html", "children": [{"tag": "body"}]}}),
            )
            .await;
        let snap = cache.get(5).await.unwrap();
        assert_eq!(snap.dom_snapshot.as_ref().unwrap().node_count(), 2);
    }

    #[tokio::test]
    async fn test_list_available_skips_empty_tabs() {
        let cache = cache();
        cache
            .apply_content_update(9, DataSource::Content, None, &json!({"title": "bare"}))
            .await;
        cache
            .apply_action_reply(4, Action::GetPageContent, &json!({"html": "<p/>"}))
            .await;
        let listed = cache.list_available().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, 4);
        assert_eq!(listed[0].1, vec!["content"]);
    }

    #[tokio::test]
    async fn test_latest_tab_tracks_most_recent_update() {
        let cache = cache();
        cache
            .apply_content_update(1, DataSource::Content, None, &json!({"title": "first"}))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache
            .apply_content_update(2, DataSource::Content, None, &json!({"title": "second"}))
            .await;
        assert_eq!(cache.latest_tab().await.unwrap().tab_id, 2);
    }
}
