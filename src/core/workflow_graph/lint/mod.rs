use crate::core::workflow_graph::diagnostics::{Diagnostic, Severity, Stats};
use crate::core::workflow_graph::selectors::SelectorManifest;
use crate::core::workflow_graph::tokens::{did_you_mean, scan, TokenKind};
use crate::core::workflow_graph::walk::{
    edges_of, lowered, nodes_of, number_field, pointer_index, pointer_push, visit_strings,
};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

pub mod edges;
pub mod rules;

pub use edges::{edge_refs, validate_edges, EdgeRef};
pub use rules::{apply_rule, NodeContext, NodeKind, NodeRule};

/// Warning codes that strict mode promotes to `WF_STRICT_WARNING` errors.
///
/// Only warnings known to make runs flaky are listed; stylistic ones
/// (labels, duplicate selectors, sparsity) are not.
pub const STRICT_ALLOWLIST: &[&str] = &[
    "WF_EDGES_EMPTY",
    "WF_LOOP_TYPE_UNKNOWN",
    "WF_NAVIGATE_DESTINATION_UNKNOWN",
    "WF_SELECTOR_UNKNOWN",
    "WF_WAIT_DURATION_LONG",
    "WF_WAIT_TYPE_UNKNOWN",
];

/// Fields whose values count as selectors for stats and duplicate detection.
pub const SELECTOR_FIELDS: &[&str] = &["selector", "sourceSelector", "targetSelector"];

const MIN_VIEWPORT: f64 = 200.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LintOptions {
    pub strict: bool,
}

/// Everything a definition-level rule may look at.
pub struct LintContext<'a> {
    pub definition: &'a Value,
    pub stats: &'a Stats,
    /// `None` when no manifest was found or it failed to load.
    pub manifest: Option<&'a SelectorManifest>,
}

/// A definition-level lint rule.
pub trait WorkflowLintRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<Diagnostic>;
}

#[derive(Debug, Clone)]
pub struct LintReport {
    pub diagnostics: Vec<Diagnostic>,
    pub stats: Stats,
}

/// Registry of built-in lint rules, run in registration order.
pub struct LintRegistry {
    rules: Vec<Box<dyn WorkflowLintRule>>,
}

impl LintRegistry {
    pub fn new() -> Self {
        Self {
            rules: built_in_rules(),
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn run(
        &self,
        definition: &Value,
        options: LintOptions,
        manifest: Option<&SelectorManifest>,
    ) -> LintReport {
        let stats = compute_stats(definition);
        let ctx = LintContext {
            definition,
            stats: &stats,
            manifest,
        };
        let mut diagnostics: Vec<Diagnostic> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(&ctx))
            .collect();
        if options.strict {
            let promoted = promote_strict(&diagnostics);
            diagnostics.extend(promoted);
        }
        LintReport { diagnostics, stats }
    }
}

impl Default for LintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lint a raw definition with the built-in rules.
pub fn lint_definition(
    definition: &Value,
    options: LintOptions,
    manifest: Option<&SelectorManifest>,
) -> LintReport {
    LintRegistry::new().run(definition, options, manifest)
}

pub fn built_in_rules() -> Vec<Box<dyn WorkflowLintRule>> {
    vec![
        Box::new(GraphStructureRule),
        Box::new(EdgeSparsityRule),
        Box::new(SelectorDuplicatesRule),
        Box::new(ViewportRule),
        Box::new(UnknownSelectorRule),
    ]
}

/// Synthesised `WF_STRICT_WARNING` errors for allowlisted warnings.
pub fn promote_strict(diagnostics: &[Diagnostic]) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning && STRICT_ALLOWLIST.contains(&d.code.as_str()))
        .map(|warning| Diagnostic {
            severity: Severity::Error,
            code: "WF_STRICT_WARNING".to_string(),
            hint: Some(format!("promoted from {}", warning.code)),
            ..warning.clone()
        })
        .collect()
}

pub fn compute_stats(definition: &Value) -> Stats {
    let nodes = nodes_of(definition);
    let mut selectors: Vec<String> = Vec::new();
    visit_strings(definition, "", &mut |text, site| {
        let is_selector_field = site.key.is_some_and(|key| SELECTOR_FIELDS.contains(&key));
        if is_selector_field && !text.trim().is_empty() {
            selectors.push(text.trim().to_string());
        }
    });
    let unique: BTreeSet<&str> = selectors.iter().map(String::as_str).collect();

    Stats {
        node_count: nodes.len(),
        edge_count: edges_of(definition).len(),
        selector_count: selectors.len(),
        unique_selector_count: unique.len(),
        element_wait_count: nodes
            .iter()
            .filter(|node| node.get("type").and_then(Value::as_str) == Some("wait"))
            .filter_map(|node| node.get("data").and_then(Value::as_object))
            .filter(|data| lowered(data, "waitType") == "element")
            .count(),
        has_metadata: matches!(definition.get("metadata"), Some(Value::Object(map)) if !map.is_empty()),
        has_execution_viewport: definition
            .pointer("/settings/executionViewport")
            .is_some_and(Value::is_object),
    }
}

/// Nodes, node rules, labels and edges, recursing into inline subflows.
struct GraphStructureRule;

impl WorkflowLintRule for GraphStructureRule {
    fn name(&self) -> &'static str {
        "graph-structure"
    }

    fn validate(&self, ctx: &LintContext<'_>) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        lint_graph(ctx.definition, "", &mut out);
        out
    }
}

fn lint_graph(definition: &Value, prefix: &str, out: &mut Vec<Diagnostic>) {
    let nodes = nodes_of(definition);
    let edges = edges_of(definition);
    let nodes_pointer = pointer_push(prefix, "nodes");

    if nodes.is_empty() {
        out.push(
            Diagnostic::error("WF_NODES_EMPTY", "workflow has no nodes").with_pointer(nodes_pointer.clone()),
        );
    }

    let empty = Map::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut nested: Vec<(String, &Value)> = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        let Some(fields) = node.as_object() else {
            continue;
        };
        let pointer = pointer_index(&nodes_pointer, index);
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let node_type = fields
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|ty| !ty.is_empty());

        match id {
            None => out.push(
                Diagnostic::error("WF_NODE_ID_MISSING", format!("node #{} has no id", index))
                    .with_node(None, node_type)
                    .with_field("id")
                    .with_pointer(pointer_push(&pointer, "id")),
            ),
            Some(id) if !seen.insert(id) => out.push(
                Diagnostic::error("WF_NODE_ID_DUPLICATE", format!("node id `{}` is used more than once", id))
                    .with_node(Some(id), node_type)
                    .with_field("id")
                    .with_pointer(pointer_push(&pointer, "id")),
            ),
            Some(_) => {}
        }

        let data = match fields.get("data") {
            None => &empty,
            Some(Value::Object(data)) => data,
            Some(_) => {
                out.push(
                    Diagnostic::error("WF_NODE_DATA_INVALID", "node data must be an object")
                        .with_node(id, node_type)
                        .with_field("data")
                        .with_pointer(pointer_push(&pointer, "data")),
                );
                &empty
            }
        };

        let Some(node_type) = node_type else {
            out.push(
                Diagnostic::error("WF_NODE_TYPE_MISSING", format!("node #{} has no type", index))
                    .with_node(id, None)
                    .with_field("type")
                    .with_pointer(pointer_push(&pointer, "type")),
            );
            continue;
        };
        let Some(kind) = NodeKind::parse(node_type) else {
            out.push(
                Diagnostic::error("WF_NODE_TYPE_UNKNOWN", format!("unknown node type `{}`", node_type))
                    .with_node(id, Some(node_type))
                    .with_field("type")
                    .with_pointer(pointer_push(&pointer, "type")),
            );
            continue;
        };

        let node_ctx = NodeContext {
            id,
            node_type,
            data,
            pointer: &pointer,
        };
        apply_rule(kind, &node_ctx, out);

        if data.get("label").and_then(Value::as_str).map(str::trim).unwrap_or("").is_empty() {
            out.push(node_ctx.warning(
                "WF_NODE_LABEL_MISSING",
                "label",
                format!("node `{}` has no label", id.unwrap_or("?")),
            ));
        }

        if kind.embeds_workflow() {
            if let Some(inline) = data.get("workflowDefinition") {
                if matches!(inline.get("nodes"), Some(Value::Array(items)) if !items.is_empty()) {
                    let inline_pointer = pointer_push(&pointer_push(&pointer, "data"), "workflowDefinition");
                    nested.push((inline_pointer, inline));
                }
            }
        }
    }

    if nodes.len() > 1 && edges.is_empty() {
        out.push(
            Diagnostic::warning(
                "WF_EDGES_EMPTY",
                format!("workflow has {} nodes but no edges", nodes.len()),
            )
            .with_pointer(pointer_push(prefix, "edges")),
        );
    }

    let edge_views = edge_refs(edges, &pointer_push(prefix, "edges"));
    out.extend(validate_edges(&edge_views, &seen));

    for (inline_pointer, inline) in nested {
        lint_graph(inline, &inline_pointer, out);
    }
}

struct EdgeSparsityRule;

impl WorkflowLintRule for EdgeSparsityRule {
    fn name(&self) -> &'static str {
        "edge-sparsity"
    }

    fn validate(&self, ctx: &LintContext<'_>) -> Vec<Diagnostic> {
        let stats = ctx.stats;
        if stats.node_count >= 2 && stats.edge_count < stats.node_count - 1 {
            vec![Diagnostic::warning(
                "WF_EDGE_SPARSITY",
                format!(
                    "{} edges cannot connect {} nodes",
                    stats.edge_count, stats.node_count
                ),
            )
            .with_pointer("/edges")]
        } else {
            Vec::new()
        }
    }
}

struct SelectorDuplicatesRule;

impl WorkflowLintRule for SelectorDuplicatesRule {
    fn name(&self) -> &'static str {
        "selector-duplicates"
    }

    fn validate(&self, ctx: &LintContext<'_>) -> Vec<Diagnostic> {
        let stats = ctx.stats;
        if stats.selector_count != stats.unique_selector_count {
            vec![Diagnostic::warning(
                "WF_SELECTOR_DUPLICATES",
                format!(
                    "{} selector occurrences but only {} distinct selectors",
                    stats.selector_count, stats.unique_selector_count
                ),
            )
            .with_hint("append /*dup-N*/ to disambiguate intentionally repeated selectors")]
        } else {
            Vec::new()
        }
    }
}

struct ViewportRule;

impl WorkflowLintRule for ViewportRule {
    fn name(&self) -> &'static str {
        "viewport"
    }

    fn validate(&self, ctx: &LintContext<'_>) -> Vec<Diagnostic> {
        let Some(viewport) = ctx
            .definition
            .pointer("/settings/executionViewport")
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };
        let width = number_field(viewport, "width");
        let height = number_field(viewport, "height");
        let too_small = |value: Option<f64>| value.is_some_and(|v| v < MIN_VIEWPORT);
        if too_small(width) || too_small(height) {
            vec![Diagnostic::warning(
                "WF_VIEWPORT_SMALL",
                format!(
                    "execution viewport {}x{} is below {}px",
                    width.unwrap_or_default(),
                    height.unwrap_or_default(),
                    MIN_VIEWPORT
                ),
            )
            .with_pointer("/settings/executionViewport")]
        } else {
            Vec::new()
        }
    }
}

/// `@selector/` ids missing from a present manifest.
struct UnknownSelectorRule;

impl WorkflowLintRule for UnknownSelectorRule {
    fn name(&self) -> &'static str {
        "unknown-selector"
    }

    fn validate(&self, ctx: &LintContext<'_>) -> Vec<Diagnostic> {
        let Some(manifest) = ctx.manifest else {
            return Vec::new();
        };
        let mut out = Vec::new();
        visit_strings(ctx.definition, "", &mut |text, site| {
            for token in scan(text, TokenKind::Selector).into_iter().flatten() {
                if manifest.contains(&token.id) {
                    continue;
                }
                let mut diagnostic = Diagnostic::warning(
                    "WF_SELECTOR_UNKNOWN",
                    format!("selector `{}` is not in the manifest", token.id),
                )
                .with_node(site.scope.id(), site.scope.node_type())
                .with_pointer(site.pointer);
                if let Some(key) = site.key {
                    diagnostic = diagnostic.with_field(key);
                }
                if let Some(hint) = did_you_mean(&manifest.suggestions(&token.id)) {
                    diagnostic = diagnostic.with_hint(hint);
                }
                out.push(diagnostic);
            }
        });
        out
    }
}
