//! Text rendering of the category/feed tree.

use std::fmt::Write;

use ttrss_core::FeedTree;

/// One line per node, two spaces of indent per level: `+ name (unread)`
/// for categories, `- name (unread)` for feeds.
pub fn render(tree: &FeedTree) -> String {
    let mut out = String::new();
    for (depth, node) in tree.walk() {
        let marker = if node.is_category() { '+' } else { '-' };
        let _ = writeln!(out, "{:pad$}{marker} {} ({})", "", node.name, node.unread, pad = depth * 2);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn renders_nested_tree() {
        let tree: FeedTree = serde_json::from_value(json!({
            "categories": {"items": [
                {"id": "CAT:1", "name": "Tech", "unread": 0, "items": [
                    {"id": "CAT:3", "name": "Rust", "items": [
                        {"id": "FEED:11", "name": "This Week in Rust", "unread": 2}
                    ]},
                    {"id": "FEED:10", "name": "LWN.net", "unread": 1}
                ]},
                {"id": "CAT:0", "name": "Uncategorized", "items": []}
            ]}
        }))
        .unwrap();

        assert_eq!(
            render(&tree),
            "+ Tech (0)\n  + Rust (0)\n    - This Week in Rust (2)\n  - LWN.net (1)\n+ Uncategorized (0)\n"
        );
    }

    #[test]
    fn empty_tree_renders_nothing() {
        let tree: FeedTree = serde_json::from_value(json!({"categories": {"items": []}})).unwrap();
        assert_eq!(render(&tree), "");
    }
}
