//! Include directive parsing
//!
//! Recognised shapes:
//!
//! ```json
//! {"$include": "components/header.json"}
//! {"$include_optional": {"path": "components/card.json", "state_id": "1",
//!                        "patch": [{"id": "title", "set": {"text": "Hi"}}]}}
//! ```
//!
//! Aliases are checked in a fixed order and the first key present wins.

use serde_json::{Map, Value};
use tracing::warn;

use super::state::StateSelection;
use crate::error::IncludeError;
use crate::tree::PatchOp;

pub const INCLUDE_KEY: &str = "$include";
pub const INCLUDE_OPTIONAL_KEY: &str = "$include_optional";

const PATH_KEYS: [&str; 3] = ["path", "src", "file"];
const PATCH_KEYS: [&str; 2] = ["patch", "patches"];
const STATE_KEYS: [&str; 10] = [
    "state_id",
    "state",
    "selected",
    "selected_id",
    "initial_state_id",
    "initial_state",
    "initial",
    "default",
    "value",
    "current",
];
const FLATTEN_KEYS: [&str; 3] = ["flatten_state", "unwrap", "inline"];
const KEEP_KEYS: [&str; 2] = ["keep_state", "keep_wrapper"];
const DIV_PATCH_KEYS: [&str; 2] = ["patch_div", "div_set"];
const SQUARE_KEYS: [&str; 2] = ["square", "enforce_square"];

/// Which directive key was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `$include`: soft unless strict mode is on
    Required,
    /// `$include_optional`: always soft
    Optional,
}

/// A directive found on an object node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Directive<'a> {
    pub kind: IncludeKind,
    pub value: &'a Value,
}

impl<'a> Directive<'a> {
    /// Find the directive on an object node
    ///
    /// When both keys are present `$include` takes precedence.
    pub fn find(node: &'a Map<String, Value>) -> Option<Self> {
        if let Some(value) = node.get(INCLUDE_KEY) {
            return Some(Self {
                kind: IncludeKind::Required,
                value,
            });
        }
        node.get(INCLUDE_OPTIONAL_KEY).map(|value| Self {
            kind: IncludeKind::Optional,
            value,
        })
    }

    /// Text shown in the placeholder when this directive fails
    pub fn attempted(&self) -> String {
        match self.value {
            Value::String(path) => path.clone(),
            Value::Object(spec) => match first_present(spec, &PATH_KEYS) {
                Some(Value::String(path)) => path.clone(),
                _ => self.value.to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// Whether the directive was a bare path or a spec object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeForm {
    Path,
    Spec,
}

/// Parsed include directive
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeSpec {
    pub form: IncludeForm,
    pub path: String,
    pub patches: Vec<PatchOp>,
    pub state: StateSelection,
}

impl IncludeSpec {
    /// Parse a directive value (string or object form)
    pub fn parse(value: &Value) -> Result<Self, IncludeError> {
        match value {
            Value::String(path) => Ok(Self {
                form: IncludeForm::Path,
                path: path.clone(),
                patches: Vec::new(),
                state: StateSelection::default(),
            }),
            Value::Object(spec) => Self::parse_spec(spec),
            other => Err(IncludeError::malformed(
                other.to_string(),
                "expected a path string or an object",
            )),
        }
    }

    fn parse_spec(spec: &Map<String, Value>) -> Result<Self, IncludeError> {
        let directive = || Value::Object(spec.clone()).to_string();

        let path = match first_present(spec, &PATH_KEYS) {
            Some(Value::String(path)) => path.clone(),
            Some(_) => return Err(IncludeError::malformed(directive(), "'path' must be a string")),
            None => return Err(IncludeError::malformed(directive(), "missing 'path'")),
        };

        let aspect_ratio = match spec.get("aspect_ratio") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_ratio(value).ok_or_else(|| {
                IncludeError::malformed(directive(), "'aspect_ratio' must be a number")
            })?),
        };
        let square = SQUARE_KEYS.iter().any(|key| is_set(spec.get(*key)));

        let state = StateSelection {
            requested: first_present(spec, &STATE_KEYS).cloned(),
            flatten: FLATTEN_KEYS.iter().any(|key| is_set(spec.get(*key))),
            keep_wrapper: KEEP_KEYS.iter().any(|key| is_set(spec.get(*key))),
            div_patch: DIV_PATCH_KEYS
                .iter()
                .filter_map(|key| spec.get(*key).and_then(Value::as_object))
                .find(|patch| !patch.is_empty())
                .cloned()
                .unwrap_or_default(),
            aspect_ratio: aspect_ratio.or(square.then_some(1.0)),
        };

        Ok(Self {
            form: IncludeForm::Spec,
            path,
            patches: parse_patches(first_present(spec, &PATCH_KEYS)),
            state,
        })
    }
}

fn first_present<'a>(spec: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| spec.get(*key))
}

/// Patch entries that do not deserialize are skipped
fn parse_patches(value: Option<&Value>) -> Vec<PatchOp> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<PatchOp>(entry.clone()) {
            Ok(op) => Some(op),
            Err(err) => {
                warn!(entry = %entry, error = %err, "skipping malformed patch entry");
                None
            }
        })
        .collect()
}

fn parse_ratio(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JSON truthiness for flag keys: `false`, `0`, `""`, `[]`, `{}` and `null` are unset
fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
