//! DOM snapshot shaping: simplified selector descent, structural pruning,
//! style stripping and node-count truncation.

use tabbridge_core::DomNode;

use crate::truncate::truncate_tree;

/// The three selector forms the bridge honors. Combinators, pseudo-classes
/// and attribute selectors are out of scope: selector resolution here is a
/// convenience, not a DOM engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(String),
    Class(String),
    Tag(String),
}

impl Selector {
    pub fn parse(input: &str) -> Option<Selector> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(id) = trimmed.strip_prefix('#') {
            return (!id.is_empty()).then(|| Selector::Id(id.to_string()));
        }
        if let Some(class) = trimmed.strip_prefix('.') {
            return (!class.is_empty()).then(|| Selector::Class(class.to_string()));
        }
        // Bare tag names only; anything with combinator syntax is rejected.
        if trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Some(Selector::Tag(trimmed.to_string()));
        }
        None
    }

    fn matches(&self, node: &DomNode) -> bool {
        match self {
            Selector::Id(id) => node.attrs.get("id").is_some_and(|v| v == id),
            Selector::Class(class) => node
                .attrs
                .get("class")
                .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
            Selector::Tag(tag) => node.tag.eq_ignore_ascii_case(tag),
        }
    }
}

/// Depth-first search for the first subtree matching `selector`.
pub fn select<'a>(root: &'a DomNode, selector: &Selector) -> Option<&'a DomNode> {
    if selector.matches(root) {
        return Some(root);
    }
    root.children.iter().find_map(|c| select(c, selector))
}

#[derive(Debug, Clone, Copy)]
pub struct DomShapeOptions {
    pub exclude_scripts: bool,
    pub exclude_styles: bool,
    pub include_computed_styles: bool,
    pub max_nodes: usize,
}

impl Default for DomShapeOptions {
    fn default() -> Self {
        Self {
            exclude_scripts: true,
            exclude_styles: true,
            include_computed_styles: false,
            max_nodes: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShapedDom {
    pub root: DomNode,
    pub node_count: usize,
    pub truncated: bool,
}

/// Apply the shaping pipeline in its fixed order: prune, strip styles,
/// truncate to the node budget.
pub fn shape_dom(root: &DomNode, opts: &DomShapeOptions) -> ShapedDom {
    let pruned = prune(root, opts);
    let (shaped, node_count, truncated) = truncate_tree(&pruned, opts.max_nodes);
    ShapedDom {
        root: shaped,
        node_count,
        truncated,
    }
}

fn prune(node: &DomNode, opts: &DomShapeOptions) -> DomNode {
    DomNode {
        tag: node.tag.clone(),
        attrs: node.attrs.clone(),
        children: node
            .children
            .iter()
            .filter(|c| !is_pruned_tag(&c.tag, opts))
            .map(|c| prune(c, opts))
            .collect(),
        text: node.text.clone(),
        styles: if opts.include_computed_styles {
            node.styles.clone()
        } else {
            None
        },
        truncated: node.truncated,
        remaining_siblings: node.remaining_siblings,
    }
}

fn is_pruned_tag(tag: &str, opts: &DomShapeOptions) -> bool {
    (opts.exclude_scripts && tag.eq_ignore_ascii_case("script"))
        || (opts.exclude_styles && tag.eq_ignore_ascii_case("style"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node(tag: &str, attrs: &[(&str, &str)], children: Vec<DomNode>) -> DomNode {
        DomNode {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
            ..DomNode::default()
        }
    }

    fn page() -> DomNode {
        node(
            "html",
            &[],
            vec![
                node("head", &[], vec![node("style", &[], vec![]), node("script", &[], vec![])]),
                node(
                    "body",
                    &[],
                    vec![
                        node("div", &[("id", "main"), ("class", "layout wide")], vec![
                            node("p", &[("class", "intro")], vec![]),
                        ]),
                        node("script", &[], vec![]),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_selector_parse_forms() {
        assert_eq!(Selector::parse("#main"), Some(Selector::Id("main".to_string())));
        assert_eq!(Selector::parse(".intro"), Some(Selector::Class("intro".to_string())));
        assert_eq!(Selector::parse("div"), Some(Selector::Tag("div".to_string())));
        assert_eq!(Selector::parse("div > p"), None);
        assert_eq!(Selector::parse("a:hover"), None);
        assert_eq!(Selector::parse(""), None);
        assert_eq!(Selector::parse("#"), None);
    }

    #[test]
    fn test_select_by_id() {
        let tree = page();
        let found = select(&tree, &Selector::Id("main".to_string())).unwrap();
        assert_eq!(found.tag, "div");
    }

    #[test]
    fn test_select_by_class_token() {
        let tree = page();
        let found = select(&tree, &Selector::Class("wide".to_string())).unwrap();
        assert_eq!(found.attrs.get("id").map(String::as_str), Some("main"));
        // "wid" is not a class token, only a substring.
        assert!(select(&tree, &Selector::Class("wid".to_string())).is_none());
    }

    #[test]
    fn test_select_first_match_depth_first() {
        let tree = page();
        let found = select(&tree, &Selector::Tag("script".to_string())).unwrap();
        // The head script comes before the body script in DFS order.
        assert!(found.children.is_empty());
    }

    #[test]
    fn test_select_not_found() {
        let tree = page();
        assert!(select(&tree, &Selector::Id("missing".to_string())).is_none());
    }

    #[test]
    fn test_shape_prunes_scripts_and_styles() {
        let shaped = shape_dom(&page(), &DomShapeOptions::default());
        fn count_tag(n: &DomNode, tag: &str) -> usize {
            usize::from(n.tag == tag)
                + n.children.iter().map(|c| count_tag(c, tag)).sum::<usize>()
        }
        assert_eq!(count_tag(&shaped.root, "script"), 0);
        assert_eq!(count_tag(&shaped.root, "style"), 0);
        assert!(!shaped.truncated);
    }

    #[test]
    fn test_shape_keeps_scripts_when_asked() {
        let opts = DomShapeOptions {
            exclude_scripts: false,
            ..DomShapeOptions::default()
        };
        let shaped = shape_dom(&page(), &opts);
        let head = &shaped.root.children[0];
        assert!(head.children.iter().any(|c| c.tag == "script"));
    }

    #[test]
    fn test_shape_strips_computed_styles_by_default() {
        let mut tree = page();
        tree.styles = Some(HashMap::from([("color".to_string(), "red".to_string())]));
        let shaped = shape_dom(&tree, &DomShapeOptions::default());
        assert!(shaped.root.styles.is_none());

        let keep = DomShapeOptions {
            include_computed_styles: true,
            ..DomShapeOptions::default()
        };
        assert!(shape_dom(&tree, &keep).root.styles.is_some());
    }

    #[test]
    fn test_shape_truncates_to_budget() {
        let wide = node(
            "body",
            &[],
            (0..100).map(|_| node("div", &[], vec![])).collect(),
        );
        let opts = DomShapeOptions {
            max_nodes: 10,
            ..DomShapeOptions::default()
        };
        let shaped = shape_dom(&wide, &opts);
        assert!(shaped.truncated);
        assert_eq!(shaped.node_count, 10);
    }
}
