//! TTL'd pagination cursors over frozen result slices.
//!
//! A cursor freezes the filtered result list at query time; successive pages
//! are disjoint, in-order slices of that frozen list regardless of what the
//! live buffers do in the meantime. Cursors are one-shot per page: every
//! `next` consumes the id it was given and mints a fresh one for the page
//! after, so an id can never be replayed.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct CursorEntry {
    items: Arc<Vec<Value>>,
    offset: usize,
    created: Instant,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Value>,
    pub offset: usize,
    pub total: usize,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

pub struct CursorStore {
    entries: Mutex<HashMap<String, CursorEntry>>,
    ttl: Duration,
}

impl CursorStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Freeze `items` and return the first page. A cursor is allocated only
    /// when there is a next page.
    pub fn open(&self, items: Vec<Value>, limit: usize) -> Page {
        let total = items.len();
        let limit = limit.max(1);
        let end = limit.min(total);
        let page_items = items[..end].to_vec();

        let mut entries = self.entries.lock();
        Self::sweep(&mut entries, self.ttl);

        let next_cursor = if end < total {
            let id = Uuid::new_v4().simple().to_string();
            entries.insert(
                id.clone(),
                CursorEntry {
                    items: Arc::new(items),
                    offset: end,
                    created: Instant::now(),
                },
            );
            Some(id)
        } else {
            None
        };

        Page {
            items: page_items,
            offset: 0,
            total,
            has_more: next_cursor.is_some(),
            next_cursor,
        }
    }

    /// Advance a cursor chain by one page. An unknown or expired id yields
    /// `None` — the defined "start over" signal, not an error.
    pub fn next(&self, cursor_id: &str, limit: usize) -> Option<Page> {
        let limit = limit.max(1);
        let mut entries = self.entries.lock();
        Self::sweep(&mut entries, self.ttl);

        let entry = entries.remove(cursor_id)?;
        let total = entry.items.len();
        let start = entry.offset.min(total);
        let end = (start + limit).min(total);
        let page_items = entry.items[start..end].to_vec();

        let next_cursor = if end < total {
            let id = Uuid::new_v4().simple().to_string();
            entries.insert(
                id.clone(),
                CursorEntry {
                    items: entry.items,
                    offset: end,
                    created: entry.created,
                },
            );
            Some(id)
        } else {
            None
        };

        Some(Page {
            items: page_items,
            offset: start,
            total,
            has_more: next_cursor.is_some(),
            next_cursor,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn sweep(entries: &mut HashMap<String, CursorEntry>, ttl: Duration) {
        entries.retain(|_, entry| entry.created.elapsed() <= ttl);
    }
}
