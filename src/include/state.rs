//! State variant selection and flattening
//!
//! A variant component is `{"type": "state", "state_id": .., "states": [..]}`
//! where each entry is `{"state_id": .., "div": {..}}`. Selection picks one
//! entry, syncs the wrapper's `state_id` and moves the entry to the front;
//! flattening then swaps the wrapper for the entry's `div`.

use serde_json::{json, Map, Value};

use crate::tree::{is_variant_component, update_node};

/// How the including directive wants a variant component handled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSelection {
    /// Requested state id; `Some(Value::Null)` still counts as a request
    pub requested: Option<Value>,
    /// Explicit `flatten_state` / `unwrap` / `inline`
    pub flatten: bool,
    /// Explicit `keep_state` / `keep_wrapper`
    pub keep_wrapper: bool,
    /// Top-level keys assigned onto the extracted `div`
    pub div_patch: Map<String, Value>,
    /// Written to the extracted `div` as `aspect: {ratio}`
    pub aspect_ratio: Option<f64>,
}

impl StateSelection {
    pub fn should_flatten(&self) -> bool {
        self.flatten || (self.requested.is_some() && !self.keep_wrapper)
    }
}

/// Outcome of [`flatten`]
#[derive(Debug, Clone, PartialEq)]
pub enum Flattened {
    /// The variant component, synced and reordered
    Wrapper(Value),
    /// The chosen entry's `div`, patched; its includes are still unresolved
    Payload(Value),
}

/// Select a state on a variant component and flatten it if requested
///
/// Non-variant nodes and components with an empty `states` list come back
/// unchanged as [`Flattened::Wrapper`].
pub fn flatten(mut variant: Value, selection: &StateSelection) -> Flattened {
    if !is_variant_component(&variant) {
        return Flattened::Wrapper(variant);
    }
    let selected = match &mut variant {
        Value::Object(map) => select_state(map, selection.requested.as_ref()),
        _ => false,
    };
    if !selected || !selection.should_flatten() {
        return Flattened::Wrapper(variant);
    }

    let chosen_div = variant
        .get("states")
        .and_then(|states| states.get(0))
        .and_then(|chosen| chosen.get("div"))
        .cloned();
    let Some(mut div) = chosen_div else {
        return Flattened::Wrapper(variant);
    };

    if let Value::Object(div) = &mut div {
        update_node(div, &selection.div_patch, &[]);
        if let Some(ratio) = selection.aspect_ratio {
            div.insert("aspect".to_string(), json!({ "ratio": ratio }));
        }
    }
    Flattened::Payload(div)
}

/// Choose the active entry of a variant component
///
/// Order: requested id, then the component's own `state_id`, then the first
/// entry. The chosen entry is moved to index 0 and its `state_id` copied onto
/// the component. Returns `false` when nothing could be chosen.
pub fn select_state(variant: &mut Map<String, Value>, requested: Option<&Value>) -> bool {
    let current = variant.get("state_id").and_then(state_key);
    let Some(Value::Array(states)) = variant.get_mut("states") else {
        return false;
    };

    let position_of = |key: Option<String>| {
        let key = key?;
        states
            .iter()
            .position(|entry| entry.get("state_id").and_then(state_key).as_ref() == Some(&key))
    };
    let chosen = position_of(requested.and_then(state_key))
        .or_else(|| position_of(current))
        .or_else(|| states.first().filter(|first| first.is_object()).map(|_| 0));
    let Some(index) = chosen else {
        return false;
    };

    states[..=index].rotate_right(1);
    let synced = states[0].get("state_id").filter(|id| !id.is_null()).cloned();
    if let Some(state_id) = synced {
        variant.insert("state_id".to_string(), state_id);
    }
    true
}

/// String form used to compare state ids (`0` and `"0"` are equal)
fn state_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}
