//! Enumerable resources derived from the snapshot cache, addressed as
//! `tab/{id}/{content|dom|console}` with an optional uniform scheme prefix.

use serde_json::{json, Value};

use tabbridge_core::config::LimitsConfig;
use tabbridge_core::{Error, Result};
use tabbridge_session::SnapshotCache;
use tabbridge_shape::{truncate_text, truncate_tree};

pub const URI_SCHEME: &str = "browser://";

/// The most recent console entries a `console` resource read returns.
const CONSOLE_READ_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Content,
    Dom,
    Console,
}

impl ResourceKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "content" => Some(Self::Content),
            "dom" => Some(Self::Dom),
            "console" => Some(Self::Console),
            _ => None,
        }
    }

    fn mime_type(&self) -> &'static str {
        match self {
            Self::Content => "text/html",
            Self::Dom | Self::Console => "application/json",
        }
    }
}

/// Only the `tab/{integer}/{kind}` suffix is validated; any scheme prefix
/// the transport applied is stripped first.
pub fn parse_uri(uri: &str) -> Result<(u32, ResourceKind)> {
    let suffix = match uri.split_once("://") {
        Some((_, rest)) => rest,
        None => uri,
    };
    let parts: Vec<&str> = suffix.split('/').collect();
    match parts.as_slice() {
        ["tab", id, kind] => {
            let tab_id: u32 = id
                .parse()
                .map_err(|_| Error::InvalidUri(uri.to_string()))?;
            let kind =
                ResourceKind::parse(kind).ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
            Ok((tab_id, kind))
        }
        _ => Err(Error::InvalidUri(uri.to_string())),
    }
}

/// Resource descriptors for every tab with cached data.
pub async fn list_resources(cache: &SnapshotCache) -> Vec<Value> {
    let mut resources = Vec::new();
    for (tab_id, kinds) in cache.list_available().await {
        let title = cache
            .get(tab_id)
            .await
            .and_then(|s| s.title.clone())
            .unwrap_or_else(|| format!("tab {tab_id}"));
        for kind in kinds {
            let (name, description) = match kind {
                "content" => (
                    format!("Page content - {title}"),
                    format!("Cached page content for tab {tab_id}"),
                ),
                "dom" => (
                    format!("DOM snapshot - {title}"),
                    format!("Cached DOM tree for tab {tab_id}"),
                ),
                _ => (
                    format!("Console messages - {title}"),
                    format!("Buffered console output for tab {tab_id}"),
                ),
            };
            resources.push(json!({
                "uri": format!("{URI_SCHEME}tab/{tab_id}/{kind}"),
                "name": name,
                "description": description,
                "mimeType": ResourceKind::parse(kind).map(|k| k.mime_type()),
            }));
        }
    }
    resources
}

/// Resolve a resource URI against the cache and return the
/// `resources/read` result. Served entirely from cached data; no agent
/// round-trip happens here.
pub async fn read_resource(cache: &SnapshotCache, limits: &LimitsConfig, uri: &str) -> Result<Value> {
    let (tab_id, kind) = parse_uri(uri)?;
    let snapshot = cache
        .get(tab_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("no cached data for tab {tab_id}")))?;

    let text = match kind {
        ResourceKind::Content => {
            let page = snapshot
                .page_content
                .as_ref()
                .ok_or_else(|| Error::NotFound(format!("no page content cached for tab {tab_id}")))?;
            truncate_text(&page.html, limits.max_html).text
        }
        ResourceKind::Dom => {
            let root = snapshot
                .dom_snapshot
                .as_ref()
                .ok_or_else(|| Error::NotFound(format!("no DOM snapshot cached for tab {tab_id}")))?;
            let (shaped, _, _) = truncate_tree(root, limits.max_dom_nodes);
            serde_json::to_string_pretty(&shaped)?
        }
        ResourceKind::Console => {
            if snapshot.console_messages.is_empty() {
                return Err(Error::NotFound(format!(
                    "no console messages buffered for tab {tab_id}"
                )));
            }
            let total = snapshot.console_messages.len();
            let start = total.saturating_sub(CONSOLE_READ_LIMIT);
            serde_json::to_string_pretty(&json!({
                "messages": &snapshot.console_messages[start..],
                "count": total,
                "limited": total > CONSOLE_READ_LIMIT,
            }))?
        }
    };

    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": kind.mime_type(),
            "text": text,
        }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabbridge_core::wire::{Action, DataSource};

    fn limits() -> LimitsConfig {
        LimitsConfig::default()
    }

    #[test]
    fn test_parse_uri_accepts_prefixed_and_bare_forms() {
        assert_eq!(parse_uri("tab/7/content").unwrap(), (7, ResourceKind::Content));
        assert_eq!(
            parse_uri("browser://tab/12/dom").unwrap(),
            (12, ResourceKind::Dom)
        );
        assert_eq!(
            parse_uri("anything://tab/3/console").unwrap(),
            (3, ResourceKind::Console)
        );
    }

    #[test]
    fn test_parse_uri_rejects_malformed_suffixes() {
        assert!(matches!(parse_uri("tab/x/content"), Err(Error::InvalidUri(_))));
        assert!(matches!(parse_uri("tab/7"), Err(Error::InvalidUri(_))));
        assert!(matches!(parse_uri("tab/7/screenshot"), Err(Error::InvalidUri(_))));
        assert!(matches!(parse_uri("window/7/content"), Err(Error::InvalidUri(_))));
    }

    #[tokio::test]
    async fn test_read_unknown_tab_is_not_found() {
        let cache = SnapshotCache::new(&limits());
        let err = read_resource(&cache, &limits(), "tab/99/content")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_content_after_action_seed() {
        let cache = SnapshotCache::new(&limits());
        cache
            .apply_action_reply(
                7,
                Action::GetPageContent,
                &json!({"url": "https://example.com", "title": "Example", "html": "<p>hi</p>"}),
            )
            .await;

        let out = read_resource(&cache, &limits(), "browser://tab/7/content")
            .await
            .unwrap();
        assert_eq!(out["contents"][0]["mimeType"], "text/html");
        assert_eq!(out["contents"][0]["text"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_read_console_returns_recent_window() {
        let cache = SnapshotCache::new(&limits());
        let messages: Vec<Value> = (0..130)
            .map(|i| json!({"level": "error", "text": format!("m{i}"), "timestamp": i}))
            .collect();
        cache
            .apply_content_update(
                2,
                DataSource::Content,
                None,
                &json!({"consoleMessages": messages}),
            )
            .await;

        let out = read_resource(&cache, &limits(), "tab/2/console").await.unwrap();
        let body: Value =
            serde_json::from_str(out["contents"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["count"], 130);
        assert_eq!(body["limited"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 100);
        assert_eq!(body["messages"][0]["text"], "m30");
    }

    #[tokio::test]
    async fn test_read_dom_is_truncated_to_cache_budget() {
        let tight = LimitsConfig {
            max_dom_nodes: 3,
            ..LimitsConfig::default()
        };
        let cache = SnapshotCache::new(&tight);
        cache
            .apply_action_reply(
                4,
                Action::GetDomSnapshot,
                &json!({"root": {"tag": "html", "children": [
                    {"tag": "a"}, {"tag": "b"}, {"tag": "c"}, {"tag": "d"}
                ]}}),
            )
            .await;

        let out = read_resource(&cache, &tight, "tab/4/dom").await.unwrap();
        let body: Value =
            serde_json::from_str(out["contents"][0]["text"].as_str().unwrap()).unwrap();
        let children = body["children"].as_array().unwrap();
        assert!(children.iter().any(|c| c["truncated"] == json!(true)));
    }

    #[tokio::test]
    async fn test_list_resources_includes_each_kind() {
        let cache = SnapshotCache::new(&limits());
        cache
            .apply_action_reply(
                1,
                Action::GetPageContent,
                &json!({"title": "Home", "html": "<html/>"}),
            )
            .await;
        cache
            .apply_content_update(
                1,
                DataSource::Content,
                None,
                &json!({"consoleMessages": [{"level": "warn", "text": "w", "timestamp": 1}]}),
            )
            .await;

        let listed = list_resources(&cache).await;
        let uris: Vec<&str> = listed.iter().filter_map(|r| r["uri"].as_str()).collect();
        assert!(uris.contains(&"browser://tab/1/content"));
        assert!(uris.contains(&"browser://tab/1/console"));
        assert!(!uris.iter().any(|u| u.ends_with("/dom")));
    }
}
