//! Network request filtering, failed-first ordering and body shaping.

use serde_json::{json, Map, Value};
use tabbridge_core::NetworkRequest;
use url::Url;

use crate::truncate::truncate_text;

#[derive(Debug, Clone, Default)]
pub struct NetworkFilter {
    pub method: Option<String>,
    pub status: Option<Vec<u16>>,
    pub resource_type: Option<Vec<String>>,
    /// Substring match on the URL's host component. Requests whose URL does
    /// not parse are excluded while this filter is active.
    pub domain: Option<String>,
    pub failed_only: bool,
}

impl NetworkFilter {
    /// Structural filters narrow the set; `failed_only` is an ordering and
    /// selection flag, not a structural filter.
    pub fn is_structural(&self) -> bool {
        self.method.is_some()
            || self.status.is_some()
            || self.resource_type.is_some()
            || self.domain.is_some()
    }

    pub fn matches(&self, req: &NetworkRequest) -> bool {
        if let Some(method) = &self.method {
            if !method.eq_ignore_ascii_case(&req.method) {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            match req.status {
                Some(code) if statuses.contains(&code) => {}
                _ => return false,
            }
        }
        if let Some(types) = &self.resource_type {
            match &req.resource_type {
                Some(rt) if types.iter().any(|t| t.eq_ignore_ascii_case(rt)) => {}
                _ => return false,
            }
        }
        if let Some(domain) = &self.domain {
            match Url::parse(&req.url).ok().and_then(|u| u.host_str().map(String::from)) {
                Some(host) if host.contains(domain.as_str()) => {}
                _ => return false,
            }
        }
        if self.failed_only && !req.is_failed() {
            return false;
        }
        true
    }

    /// Filter, then stably sort failed requests ahead of successful ones when
    /// no structural filter is active or when `failed_only` is set. Ties keep
    /// their original order.
    pub fn apply(&self, requests: &[NetworkRequest]) -> Vec<NetworkRequest> {
        let mut out: Vec<NetworkRequest> =
            requests.iter().filter(|r| self.matches(r)).cloned().collect();
        if !self.is_structural() || self.failed_only {
            out.sort_by_key(|r| !r.is_failed());
        }
        out
    }

    pub fn describe(&self) -> Value {
        json!({
            "method": self.method,
            "status": self.status,
            "resourceType": self.resource_type,
            "domain": self.domain,
            "failedOnly": self.failed_only,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BodyOptions {
    pub include_request_bodies: bool,
    pub include_response_bodies: bool,
    pub max_request_body: usize,
    pub max_response_body: usize,
}

/// Serialize requests for the client, replacing bodies with an
/// `{omitted, originalSize}` placeholder unless inclusion was asked for.
/// Included bodies are truncated to the configured per-body limit.
pub fn shape_requests(requests: &[NetworkRequest], opts: &BodyOptions) -> Vec<Value> {
    requests
        .iter()
        .map(|req| {
            let mut obj = match serde_json::to_value(req) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            shape_body(
                &mut obj,
                "requestBody",
                req.request_body.as_deref(),
                opts.include_request_bodies,
                opts.max_request_body,
            );
            shape_body(
                &mut obj,
                "responseBody",
                req.response_body.as_deref(),
                opts.include_response_bodies,
                opts.max_response_body,
            );
            Value::Object(obj)
        })
        .collect()
}

fn shape_body(obj: &mut Map<String, Value>, key: &str, body: Option<&str>, include: bool, limit: usize) {
    let Some(body) = body else {
        obj.remove(key);
        return;
    };
    if include {
        let cut = truncate_text(body, limit);
        obj.insert(key.to_string(), json!(cut.text));
    } else {
        obj.insert(
            key.to_string(),
            json!({"omitted": true, "originalSize": body.len()}),
        );
    }
}
