//! Minimal on-the-wire form handed to the execution backend.

use serde_json::{Map, Value};

const KEPT_KEYS: &[&str] = &["nodes", "edges", "settings"];

/// Keep only `nodes`, `edges` and `settings`, unwrapping a `flow_definition`
/// envelope first. Inline subflow definitions are cleaned recursively.
///
/// `clean(clean(d)) == clean(d)` for every input.
pub fn clean_definition(definition: &Value) -> Value {
    let source = match definition.get("flow_definition") {
        Some(inner @ Value::Object(_)) => inner,
        _ => definition,
    };
    let Some(fields) = source.as_object() else {
        return Value::Object(Map::new());
    };

    let mut cleaned = Map::new();
    for key in KEPT_KEYS {
        if let Some(value) = fields.get(*key) {
            cleaned.insert((*key).to_string(), value.clone());
        }
    }
    if let Some(Value::Array(nodes)) = cleaned.get_mut("nodes") {
        for node in nodes.iter_mut() {
            clean_nested(node);
        }
    }
    Value::Object(cleaned)
}

fn clean_nested(node: &mut Value) {
    let Some(inline) = node.pointer_mut("/data/workflowDefinition") else {
        return;
    };
    if inline.is_object() {
        *inline = clean_definition(inline);
    }
}
