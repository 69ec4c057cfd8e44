//! Console message filtering. Pure functions, input order preserved.

use serde_json::{json, Value};
use tabbridge_core::ConsoleMessage;

#[derive(Debug, Clone, Default)]
pub struct ConsoleFilter {
    /// Levels to keep; `None` keeps everything. Callers apply the
    /// `["error", "warn"]` default before building the filter.
    pub levels: Option<Vec<String>>,
    /// Case-insensitive substring match against the message text.
    pub search_term: Option<String>,
    /// Keep messages with `timestamp >= since` (epoch milliseconds).
    pub since: Option<i64>,
}

impl ConsoleFilter {
    pub fn matches(&self, msg: &ConsoleMessage) -> bool {
        if let Some(levels) = &self.levels {
            if !levels.iter().any(|l| l.eq_ignore_ascii_case(&msg.level)) {
                return false;
            }
        }
        if let Some(term) = &self.search_term {
            if !msg.text.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if msg.timestamp < since {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, messages: &[ConsoleMessage]) -> Vec<ConsoleMessage> {
        messages.iter().filter(|m| self.matches(m)).cloned().collect()
    }

    /// Echo of the active filters, returned alongside paginated results.
    pub fn describe(&self) -> Value {
        json!({
            "logLevels": self.levels,
            "searchTerm": self.search_term,
            "since": self.since,
        })
    }
}
