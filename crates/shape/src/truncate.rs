//! Deterministic bounded truncation for strings and DOM trees.

use serde_json::Value;
use tabbridge_core::DomNode;

const MARKER_PREFIX: &str = "\n[truncated; ";
const MARKER_SUFFIX: &str = " chars total]";

#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedText {
    pub text: String,
    pub original_len: usize,
    pub truncated: bool,
}

/// Keep the first `limit` chars of `s`, appending a marker that records the
/// original length. Re-applying to already-truncated output returns it
/// unchanged, so repeated invocation is byte-stable.
pub fn truncate_text(s: &str, limit: usize) -> TruncatedText {
    if has_truncation_marker(s) {
        return TruncatedText {
            text: s.to_string(),
            original_len: s.chars().count(),
            truncated: true,
        };
    }
    let total = s.chars().count();
    if total <= limit {
        return TruncatedText {
            text: s.to_string(),
            original_len: total,
            truncated: false,
        };
    }
    let head: String = s.chars().take(limit).collect();
    TruncatedText {
        text: format!("{head}{MARKER_PREFIX}{total}{MARKER_SUFFIX}"),
        original_len: total,
        truncated: true,
    }
}

fn has_truncation_marker(s: &str) -> bool {
    if !s.ends_with(MARKER_SUFFIX) {
        return false;
    }
    match s.rfind(MARKER_PREFIX) {
        Some(idx) => {
            let digits = &s[idx + MARKER_PREFIX.len()..s.len() - MARKER_SUFFIX.len()];
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Depth-first copy of `root` that stops once `max_nodes` nodes have been
/// visited. Where the walk stops mid-sibling-list, a placeholder node with
/// `truncated: true` and the count of unvisited siblings is inserted.
/// Returns the copied tree, the number of visited nodes, and whether any
/// truncation happened.
pub fn truncate_tree(root: &DomNode, max_nodes: usize) -> (DomNode, usize, bool) {
    let budget = max_nodes.max(1);
    let mut visited = 0usize;
    let mut truncated = false;
    let out = walk(root, budget, &mut visited, &mut truncated);
    (out, visited, truncated)
}

fn walk(node: &DomNode, budget: usize, visited: &mut usize, truncated: &mut bool) -> DomNode {
    *visited += 1;
    let mut out = DomNode {
        tag: node.tag.clone(),
        attrs: node.attrs.clone(),
        children: Vec::with_capacity(node.children.len()),
        text: node.text.clone(),
        styles: node.styles.clone(),
        truncated: node.truncated,
        remaining_siblings: node.remaining_siblings,
    };
    for (i, child) in node.children.iter().enumerate() {
        if *visited >= budget {
            *truncated = true;
            out.children.push(DomNode::placeholder(node.children.len() - i));
            break;
        }
        out.children.push(walk(child, budget, visited, truncated));
    }
    out
}

/// Length of the JSON encoding of `v`. Diagnostics only, never a
/// correctness predicate.
pub fn json_size(v: &Value) -> usize {
    serde_json::to_string(v).map(|s| s.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(depth: usize) -> DomNode {
        let mut node = DomNode {
            tag: "span".to_string(),
            ..DomNode::default()
        };
        for _ in 1..depth {
            node = DomNode {
                tag: "div".to_string(),
                children: vec![node],
                ..DomNode::default()
            };
        }
        node
    }

    fn flat(children: usize) -> DomNode {
        DomNode {
            tag: "ul".to_string(),
            children: (0..children)
                .map(|_| DomNode {
                    tag: "li".to_string(),
                    ..DomNode::default()
                })
                .collect(),
            ..DomNode::default()
        }
    }

    #[test]
    fn test_truncate_text_short_input_untouched() {
        let out = truncate_text("hello", 10);
        assert_eq!(out.text, "hello");
        assert_eq!(out.original_len, 5);
        assert!(!out.truncated);
    }

    #[test]
    fn test_truncate_text_records_original_length() {
        let input = "a".repeat(100);
        let out = truncate_text(&input, 10);
        assert!(out.truncated);
        assert_eq!(out.original_len, 100);
        assert!(out.text.starts_with("aaaaaaaaaa\n[truncated; 100"));
    }

    #[test]
    fn test_truncate_text_is_idempotent() {
        let input = "x".repeat(5_000);
        let once = truncate_text(&input, 200);
        let twice = truncate_text(&once.text, 200);
        assert_eq!(once.text, twice.text);
        assert!(twice.truncated);
    }

    #[test]
    fn test_truncate_text_is_deterministic() {
        let input = "payload ".repeat(64);
        assert_eq!(truncate_text(&input, 33).text, truncate_text(&input, 33).text);
    }

    #[test]
    fn test_truncate_text_multibyte_boundary() {
        let input = "héllo wörld with ünïcode".repeat(10);
        let out = truncate_text(&input, 7);
        assert!(out.truncated);
        // Chars, not bytes: the head keeps exactly 7 chars.
        let head: String = out.text.chars().take(7).collect();
        assert_eq!(head, input.chars().take(7).collect::<String>());
    }

    #[test]
    fn test_truncate_tree_within_budget() {
        let tree = flat(5);
        let (out, visited, truncated) = truncate_tree(&tree, 100);
        assert_eq!(visited, 6);
        assert!(!truncated);
        assert_eq!(out.node_count(), 6);
    }

    #[test]
    fn test_truncate_tree_caps_node_count() {
        let tree = flat(50);
        let (out, visited, truncated) = truncate_tree(&tree, 10);
        assert!(truncated);
        assert_eq!(visited, 10);
        // Visited nodes plus one placeholder.
        assert_eq!(out.node_count(), 11);
        let last = out.children.last().unwrap();
        assert_eq!(last.truncated, Some(true));
        assert_eq!(last.remaining_siblings, Some(41));
    }

    #[test]
    fn test_truncate_tree_deep_chain() {
        let tree = chain(30);
        let (out, visited, truncated) = truncate_tree(&tree, 5);
        assert!(truncated);
        assert_eq!(visited, 5);
        assert!(out.node_count() <= 6);
    }

    #[test]
    fn test_json_size() {
        assert_eq!(json_size(&serde_json::json!({"a":1})), 7);
    }
}
