//! Shape helpers shared by every stage that walks raw definitions.
//!
//! Definitions stay as `serde_json::Value` so that every stage can report a
//! precise pointer on shape mismatches instead of failing a global decode.

use serde_json::{Map, Value};

/// Append one reference token to a JSON pointer (RFC 6901 escaping).
pub fn pointer_push(base: &str, token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    format!("{}/{}", base, escaped)
}

pub fn pointer_index(base: &str, index: usize) -> String {
    format!("{}/{}", base, index)
}

/// The node enclosing a visited value, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeScope {
    pub id: Option<String>,
    pub node_type: Option<String>,
}

impl NodeScope {
    pub fn of(node: &Value) -> Self {
        Self {
            id: node.get("id").and_then(Value::as_str).map(ToOwned::to_owned),
            node_type: node.get("type").and_then(Value::as_str).map(ToOwned::to_owned),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }
}

/// Location of a visited string value.
pub struct StringSite<'a> {
    pub pointer: &'a str,
    pub key: Option<&'a str>,
    pub scope: &'a NodeScope,
}

/// Visit every string in `value` depth-first, in document order.
pub fn visit_strings<F>(value: &Value, pointer: &str, f: &mut F)
where
    F: FnMut(&str, &StringSite<'_>),
{
    walk(value, pointer, None, &NodeScope::default(), f);
}

fn walk<F>(value: &Value, pointer: &str, key: Option<&str>, scope: &NodeScope, f: &mut F)
where
    F: FnMut(&str, &StringSite<'_>),
{
    match value {
        Value::String(text) => f(
            text.as_str(),
            &StringSite {
                pointer,
                key,
                scope,
            },
        ),
        Value::Array(items) => {
            let in_nodes = key == Some("nodes");
            for (index, item) in items.iter().enumerate() {
                let child = pointer_index(pointer, index);
                if in_nodes && item.is_object() {
                    walk(item, &child, None, &NodeScope::of(item), f);
                } else {
                    walk(item, &child, key, scope, f);
                }
            }
        }
        Value::Object(map) => {
            for (child_key, child) in map {
                let child_pointer = pointer_push(pointer, child_key);
                walk(child, &child_pointer, Some(child_key.as_str()), scope, f);
            }
        }
        _ => {}
    }
}

/// Mutable counterpart of [`visit_strings`]; the callback may rewrite the string in place.
pub fn visit_strings_mut<F>(value: &mut Value, pointer: &str, f: &mut F)
where
    F: FnMut(&mut String, &StringSite<'_>),
{
    walk_mut(value, pointer, None, &NodeScope::default(), f);
}

fn walk_mut<F>(value: &mut Value, pointer: &str, key: Option<&str>, scope: &NodeScope, f: &mut F)
where
    F: FnMut(&mut String, &StringSite<'_>),
{
    match value {
        Value::String(text) => f(
            text,
            &StringSite {
                pointer,
                key,
                scope,
            },
        ),
        Value::Array(items) => {
            let in_nodes = key == Some("nodes");
            for (index, item) in items.iter_mut().enumerate() {
                let child = pointer_index(pointer, index);
                if in_nodes && item.is_object() {
                    let node_scope = NodeScope::of(item);
                    walk_mut(item, &child, None, &node_scope, f);
                } else {
                    walk_mut(item, &child, key, scope, f);
                }
            }
        }
        Value::Object(map) => {
            for (child_key, child) in map.iter_mut() {
                let child_pointer = pointer_push(pointer, child_key);
                walk_mut(child, &child_pointer, Some(child_key.as_str()), scope, f);
            }
        }
        _ => {}
    }
}

/// "Present and non-empty": trimmed non-empty string, any number or boolean,
/// non-empty array or object.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => true,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// A trimmed, non-empty string field.
pub fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Lowercased, trimmed string field, empty when absent or not a string.
pub fn lowered(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(|text| text.trim().to_lowercase())
        .unwrap_or_default()
}

/// Numeric field accepting JSON numbers and numeric strings.
pub fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// The nodes array of a definition, or an empty slice when absent or malformed.
pub fn nodes_of(definition: &Value) -> &[Value] {
    definition
        .get("nodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn edges_of(definition: &Value) -> &[Value] {
    definition
        .get("edges")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
