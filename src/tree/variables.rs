//! Card-level variable merging
//!
//! Rendering clients read variables from the `card` node of a document, so
//! updates are written there rather than on the document root.

use serde_json::{json, Map, Value};

/// Update or append `{name, type, value}` entries in the card's `variables`
///
/// Uses the `card` object when the root has one, otherwise the root itself.
/// Returns `false` when there is no object to write to or `variables` exists
/// but is not a list.
pub fn merge_card_variables(root: &mut Value, values: &Map<String, Value>) -> bool {
    let has_card = root.get("card").is_some();
    let card = if has_card { &mut root["card"] } else { root };
    let Value::Object(card) = card else {
        return false;
    };

    let variables = card
        .entry("variables")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(variables) = variables else {
        return false;
    };

    for (name, value) in values {
        let kind = variable_type(value);
        let existing = variables
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name.as_str()));

        match existing {
            Some(entry) => {
                entry.insert("type".to_string(), Value::from(kind));
                entry.insert("value".to_string(), value.clone());
            }
            None => variables.push(json!({"name": name, "type": kind, "value": value})),
        }
    }
    true
}

fn variable_type(value: &Value) -> &'static str {
    match value {
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        _ => "string",
    }
}
