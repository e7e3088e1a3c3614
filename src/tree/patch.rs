//! Id-based patch and replace operations
//!
//! Nodes are addressed by their `id` field. Targets commonly live inside
//! variant payloads, so every operation traverses with [`visit_mut`], which
//! descends into `states[].div`.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::walk::{find_first, is_variant_component, node_id, node_type, visit_mut, Visit};

/// Key holding a node's action; assigning `null` to it deletes the key
pub const ACTION_KEY: &str = "action";

/// Patch target ids that address the root of the patched subtree
pub const ROOT_TARGETS: [&str; 3] = ["", "*", "root"];

/// A single `{id, set, unset}` patch operation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawPatchOp")]
pub struct PatchOp {
    pub id: Option<String>,
    pub set: Map<String, Value>,
    pub unset: Vec<String>,
    /// `id` was given but is not a string: matches no node and is not a root target
    unusable_id: bool,
}

/// Wire shape; `id` may hold any JSON value
#[derive(Deserialize)]
struct RawPatchOp {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    set: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    unset: Vec<String>,
}

impl From<RawPatchOp> for PatchOp {
    fn from(raw: RawPatchOp) -> Self {
        let (id, unusable_id) = match raw.id {
            Value::Null => (None, false),
            Value::String(id) => (Some(id), false),
            Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => (None, true),
        };
        Self {
            id,
            set: raw.set,
            unset: raw.unset,
            unusable_id,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PatchOp {
    /// Create an empty operation targeting `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Add a key assignment
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set.insert(key.into(), value);
        self
    }

    /// Add a key removal
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.unset.push(key.into());
        self
    }

    /// Whether the id addresses the subtree root rather than a named node
    pub fn targets_root(&self) -> bool {
        !self.unusable_id
            && self
                .id
                .as_deref()
                .map_or(true, |id| ROOT_TARGETS.contains(&id))
    }

    /// Apply to every matching node in `tree`, returning the match count
    pub fn apply(&self, tree: &mut Value) -> usize {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => patch_by_id(tree, id, &self.set, &self.unset),
            _ => 0,
        }
    }

    /// Apply by id, falling back to the root's own keys
    ///
    /// The fallback fires when nothing matched and either the id targets the
    /// root or the tree itself is a variant component. Returns whether the
    /// operation landed anywhere.
    pub fn apply_with_root_fallback(&self, tree: &mut Value) -> bool {
        if self.apply(tree) > 0 {
            return true;
        }
        if !(self.targets_root() || is_variant_component(tree)) {
            return false;
        }
        match tree {
            Value::Object(map) => {
                update_node(map, &self.set, &self.unset);
                true
            }
            _ => false,
        }
    }
}

/// Remove `unset` keys, then assign `set` entries
///
/// A `null` action is a deletion, not a stored null.
pub fn update_node(node: &mut Map<String, Value>, set: &Map<String, Value>, unset: &[String]) {
    for key in unset {
        node.remove(key);
    }
    for (key, value) in set {
        if key == ACTION_KEY && value.is_null() {
            node.remove(ACTION_KEY);
        } else {
            node.insert(key.clone(), value.clone());
        }
    }
}

/// Patch every node whose `id` equals `id`; returns the number of matches
pub fn patch_by_id(
    tree: &mut Value,
    id: &str,
    set: &Map<String, Value>,
    unset: &[String],
) -> usize {
    let mut matches = 0;
    visit_mut(tree, &mut |node| {
        if node_id(node) == Some(id) {
            if let Value::Object(map) = node {
                update_node(map, set, unset);
                matches += 1;
            }
        }
        Visit::Continue
    });
    matches
}

/// Replace the first pre-order node whose `id` equals `id`
///
/// The replacement takes over the matched node's slot in its container.
pub fn replace_by_id(tree: &mut Value, id: &str, replacement: &Value) -> bool {
    replace_first(tree, replacement, |node| node_id(node) == Some(id))
}

/// Replace the first pre-order node of the given `type`
pub fn replace_first_by_type(tree: &mut Value, node_type_name: &str, replacement: &Value) -> bool {
    replace_first(tree, replacement, |node| node_type(node) == Some(node_type_name))
}

/// Try each id in order and replace the first that matches
///
/// Returns the id that was replaced.
pub fn replace_first_of_any<'i>(
    tree: &mut Value,
    ids: &[&'i str],
    replacement: &Value,
) -> Option<&'i str> {
    ids.iter()
        .copied()
        .find(|id| replace_by_id(tree, id, replacement))
}

/// First node in pre-order whose `id` equals `id`
pub fn find_by_id<'a>(tree: &'a Value, id: &str) -> Option<&'a Value> {
    find_first(tree, &|node| node_id(node) == Some(id))
}

fn replace_first<P>(tree: &mut Value, replacement: &Value, pred: P) -> bool
where
    P: Fn(&Value) -> bool,
{
    let mut found = false;
    visit_mut(tree, &mut |node| {
        if pred(node) {
            *node = replacement.clone();
            found = true;
            return Visit::Stop;
        }
        Visit::Continue
    });
    found
}
