//! Edge validation shared by the v1 lint and the V2 validator.

use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::walk::{pointer_index, pointer_push};
use serde_json::Value;
use std::collections::HashSet;

/// A borrowed view of one edge, independent of the dialect it came from.
#[derive(Debug, Clone)]
pub struct EdgeRef<'a> {
    pub id: Option<&'a str>,
    pub source: Option<&'a str>,
    pub target: Option<&'a str>,
    /// JSON pointer of the edge.
    pub pointer: String,
}

impl EdgeRef<'_> {
    fn describe(&self, index: usize) -> String {
        match self.id.filter(|id| !id.is_empty()) {
            Some(id) => format!("edge `{}`", id),
            None => format!("edge #{}", index),
        }
    }
}

/// Edge views of a raw v1 `edges` array located at `pointer`.
pub fn edge_refs<'a>(edges: &'a [Value], pointer: &str) -> Vec<EdgeRef<'a>> {
    edges
        .iter()
        .enumerate()
        .map(|(index, edge)| EdgeRef {
            id: edge.get("id").and_then(Value::as_str),
            source: edge.get("source").and_then(Value::as_str),
            target: edge.get("target").and_then(Value::as_str),
            pointer: pointer_index(pointer, index),
        })
        .collect()
}

/// Validate every edge against the node ids of its enclosing definition.
///
/// Only self-loops count as cycles; longer cycles are legal because loops
/// are modelled as loop nodes.
pub fn validate_edges(edges: &[EdgeRef<'_>], node_ids: &HashSet<&str>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for (index, edge) in edges.iter().enumerate() {
        let name = edge.describe(index);
        let source = edge.source.map(str::trim).filter(|id| !id.is_empty());
        let target = edge.target.map(str::trim).filter(|id| !id.is_empty());

        for (field, endpoint) in [("source", source), ("target", target)] {
            if endpoint.is_none() {
                out.push(
                    Diagnostic::error(
                        "WF_EDGE_ENDPOINT_MISSING",
                        format!("{} has no {}", name, field),
                    )
                    .with_field(field)
                    .with_pointer(pointer_push(&edge.pointer, field)),
                );
            }
        }

        if let (Some(source), Some(target)) = (source, target) {
            if source == target {
                out.push(
                    Diagnostic::error(
                        "WF_EDGE_CYCLE_SELF",
                        format!("{} connects node `{}` to itself", name, source),
                    )
                    .with_node(Some(source), None)
                    .with_pointer(edge.pointer.clone()),
                );
            }
        }

        if let Some(source) = source.filter(|id| !node_ids.contains(id)) {
            out.push(
                Diagnostic::error(
                    "WF_EDGE_SOURCE_UNKNOWN",
                    format!("{} starts at unknown node `{}`", name, source),
                )
                .with_field("source")
                .with_pointer(pointer_push(&edge.pointer, "source")),
            );
        }
        if let Some(target) = target.filter(|id| !node_ids.contains(id)) {
            out.push(
                Diagnostic::error(
                    "WF_EDGE_TARGET_UNKNOWN",
                    format!("{} ends at unknown node `{}`", name, target),
                )
                .with_field("target")
                .with_pointer(pointer_push(&edge.pointer, "target")),
            );
        }
    }
    out
}
