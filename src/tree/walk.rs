//! Pre-order traversal over SDUI node trees
//!
//! Every object and array is entered, so variant payloads (`states[].div`),
//! tab pages (`items[].div`) and the entries wrapping them are all visited.

use serde_json::Value;

/// Traversal control returned by visitor callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// The `id` field of an object node, if it is a string
pub fn node_id(node: &Value) -> Option<&str> {
    node.get("id").and_then(Value::as_str)
}

/// The `type` field of an object node, if it is a string
pub fn node_type(node: &Value) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

/// Whether `node` is a variant component (`type == "state"` with a `states` list)
pub fn is_variant_component(node: &Value) -> bool {
    node_type(node) == Some("state") && node.get("states").is_some_and(Value::is_array)
}

/// Visit every node slot in pre-order, mutably
///
/// The callback sees the node before its children; if it rewrites the node,
/// traversal continues into the rewritten children.
pub fn visit_mut<F>(node: &mut Value, f: &mut F) -> Visit
where
    F: FnMut(&mut Value) -> Visit,
{
    if f(node) == Visit::Stop {
        return Visit::Stop;
    }

    match node {
        Value::Object(map) => {
            for child in map.values_mut() {
                if visit_mut(child, f) == Visit::Stop {
                    return Visit::Stop;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if visit_mut(item, f) == Visit::Stop {
                    return Visit::Stop;
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }

    Visit::Continue
}

/// Find the first node in pre-order satisfying `pred`
pub fn find_first<'a, P>(node: &'a Value, pred: &P) -> Option<&'a Value>
where
    P: Fn(&Value) -> bool,
{
    if pred(node) {
        return Some(node);
    }

    match node {
        Value::Object(map) => map.values().find_map(|child| find_first(child, pred)),
        Value::Array(items) => items.iter().find_map(|item| find_first(item, pred)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visit_order_is_preorder() {
        let mut tree = json!({
            "id": "root",
            "items": [
                {"id": "a", "items": [{"id": "a1"}]},
                {"id": "b"}
            ]
        });

        let mut seen = Vec::new();
        visit_mut(&mut tree, &mut |node| {
            if let Some(id) = node_id(node) {
                seen.push(id.to_string());
            }
            Visit::Continue
        });
        assert_eq!(seen, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_visit_reaches_payload_entries_and_divs() {
        let mut tree = json!({
            "type": "state",
            "states": [
                {
                    "state_id": "0",
                    "id": "wrapper",
                    "div": {"id": "inside"},
                    "extra": {"id": "beside"}
                }
            ]
        });

        let mut seen = Vec::new();
        visit_mut(&mut tree, &mut |node| {
            if let Some(id) = node_id(node) {
                seen.push(id.to_string());
            }
            Visit::Continue
        });
        assert_eq!(seen, vec!["wrapper", "inside", "beside"]);
    }

    #[test]
    fn test_visit_stop_short_circuits() {
        let mut tree = json!([{"id": "a"}, {"id": "b"}]);
        let mut count = 0;
        let flow = visit_mut(&mut tree, &mut |node| {
            if node_id(node).is_some() {
                count += 1;
                return Visit::Stop;
            }
            Visit::Continue
        });
        assert_eq!(flow, Visit::Stop);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_find_first_through_tabs() {
        let tree = json!({
            "type": "tabs",
            "items": [
                {"title": "One", "div": {"type": "text", "id": "t1"}},
                {"title": "Two", "div": {"type": "text", "id": "t2"}}
            ]
        });
        let found = find_first(&tree, &|n| node_id(n) == Some("t2"));
        assert_eq!(found, Some(&json!({"type": "text", "id": "t2"})));
    }

    #[test]
    fn test_find_first_sees_tab_item_itself() {
        let tree = json!({
            "type": "tabs",
            "items": [{"title": "A", "id": "tab_a", "div": {"type": "text"}}]
        });
        let found = find_first(&tree, &|n| node_id(n) == Some("tab_a"));
        assert_eq!(found.and_then(|n| n.get("title")), Some(&json!("A")));
    }

    #[test]
    fn test_is_variant_component() {
        assert!(is_variant_component(&json!({"type": "state", "states": []})));
        assert!(!is_variant_component(&json!({"type": "state"})));
        assert!(!is_variant_component(&json!({"type": "container", "states": []})));
        assert!(!is_variant_component(&json!("state")));
    }
}
