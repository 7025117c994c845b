//! Validator for the typed V2 message graph.
//!
//! Conditions that also exist in v1 (empty workflow, missing or duplicate
//! ids, missing labels, edge problems) use the v1 codes; everything that is
//! specific to the V2 action contract is reported under `WF_V2_*`.

use crate::core::workflow_graph::diagnostics::{Diagnostic, Stats, ValidationResult};
use crate::core::workflow_graph::lint::{validate_edges, EdgeRef};
use crate::core::workflow_graph::walk::{pointer_index, pointer_push};
use playcheck_types::{
    ActionDefinition, ActionParams, ActionType, LoopParams, LoopType, SubflowParams,
    WorkflowDefinitionV2, WorkflowNodeV2,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;
use tracing::debug;

const MAX_SAFE_ITERATIONS: i64 = 1000;

/// Decode a raw V2 document and validate it. A decode failure is a single
/// `WF_V2_SCHEMA_INVALID` error.
pub fn validate_v2_json(raw: &Value) -> ValidationResult {
    let started = Instant::now();
    match serde_json::from_value::<WorkflowDefinitionV2>(raw.clone()) {
        Ok(definition) => validate_v2(&definition),
        Err(err) => {
            let diagnostic = Diagnostic::error(
                "WF_V2_SCHEMA_INVALID",
                format!("not a V2 workflow definition: {}", err),
            )
            .with_pointer("");
            ValidationResult::from_diagnostics(vec![diagnostic], Stats::default(), started)
        }
    }
}

pub fn validate_v2(definition: &WorkflowDefinitionV2) -> ValidationResult {
    let started = Instant::now();
    let mut out = Vec::new();

    if definition.nodes.is_empty() {
        out.push(Diagnostic::error("WF_NODES_EMPTY", "workflow has no nodes").with_pointer("/nodes"));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (index, node) in definition.nodes.iter().enumerate() {
        let pointer = pointer_index("/nodes", index);
        let id = Some(node.id.trim()).filter(|id| !id.is_empty());
        match id {
            None => out.push(
                Diagnostic::error("WF_NODE_ID_MISSING", format!("node #{} has no id", index))
                    .with_field("id")
                    .with_pointer(pointer_push(&pointer, "id")),
            ),
            Some(id) if !seen.insert(id) => out.push(
                Diagnostic::error("WF_NODE_ID_DUPLICATE", format!("node id `{}` is used more than once", id))
                    .with_node(Some(id), None)
                    .with_field("id")
                    .with_pointer(pointer_push(&pointer, "id")),
            ),
            Some(_) => {}
        }
        validate_node(node, id, &pointer, &mut out);
    }

    let edges: Vec<EdgeRef<'_>> = definition
        .edges
        .iter()
        .enumerate()
        .map(|(index, edge)| EdgeRef {
            id: Some(edge.id.as_str()),
            source: Some(edge.source.as_str()),
            target: Some(edge.target.as_str()),
            pointer: pointer_index("/edges", index),
        })
        .collect();
    out.extend(validate_edges(&edges, &seen));

    debug!(nodes = definition.nodes.len(), diagnostics = out.len(), "validated V2 workflow");
    ValidationResult::from_diagnostics(out, stats_v2(definition), started)
}

/// Locators for diagnostics about one action.
struct ActionSite<'a> {
    id: Option<&'a str>,
    kind: &'a str,
    pointer: String,
}

impl ActionSite<'_> {
    fn at(&self, diagnostic: Diagnostic, path: &[&str]) -> Diagnostic {
        let pointer = path
            .iter()
            .fold(self.pointer.clone(), |pointer, token| pointer_push(&pointer, token));
        let field = path.last().copied().unwrap_or(self.kind);
        diagnostic
            .with_node(self.id, Some(self.kind))
            .with_field(field)
            .with_pointer(pointer)
    }

    fn name(&self) -> String {
        format!("{} node `{}`", self.kind, self.id.unwrap_or("?"))
    }
}

fn validate_node(node: &WorkflowNodeV2, id: Option<&str>, pointer: &str, out: &mut Vec<Diagnostic>) {
    let action_pointer = pointer_push(pointer, "action");
    let action = match &node.action {
        Some(action) if action.action_type != ActionType::Unspecified => action,
        _ => {
            out.push(
                Diagnostic::error(
                    "WF_V2_ACTION_TYPE_UNSPECIFIED",
                    format!("node `{}` has no action type", id.unwrap_or("?")),
                )
                .with_node(id, None)
                .with_field("type")
                .with_pointer(pointer_push(&action_pointer, "type")),
            );
            return;
        }
    };
    let kind = action.action_type.params_field().unwrap_or("unspecified");
    let site = ActionSite {
        id,
        kind,
        pointer: action_pointer,
    };

    if action.label().trim().is_empty() {
        out.push(site.at(
            Diagnostic::warning("WF_NODE_LABEL_MISSING", format!("node `{}` has no label", id.unwrap_or("?"))),
            &["metadata", "label"],
        ));
    }

    let Some(params) = action.params() else {
        out.push(site.at(
            Diagnostic::error(
                "WF_V2_ACTION_PARAMS_MISSING",
                format!("{} is missing its `{}` parameters", site.name(), kind),
            ),
            &[kind],
        ));
        return;
    };

    match params {
        ActionParams::Navigate(navigate) => {
            let has_scenario = navigate.scenario.as_deref().is_some_and(|s| !s.trim().is_empty());
            if navigate.url.trim().is_empty() && !has_scenario {
                out.push(site.at(
                    Diagnostic::error(
                        "WF_V2_NAVIGATE_URL_REQUIRED",
                        format!("{} needs a url or a scenario", site.name()),
                    ),
                    &[kind, "url"],
                ));
            }
        }
        ActionParams::Click(pointer_action)
        | ActionParams::Hover(pointer_action)
        | ActionParams::Focus(pointer_action)
        | ActionParams::Blur(pointer_action) => {
            if pointer_action.selector.trim().is_empty() {
                out.push(site.at(
                    Diagnostic::error("WF_V2_SELECTOR_REQUIRED", format!("{} needs a selector", site.name())),
                    &[kind, "selector"],
                ));
            }
        }
        ActionParams::Loop(loop_params) => validate_loop(loop_params, &site, out),
        ActionParams::Subflow(subflow) => validate_subflow(subflow, &site, out),
        _ => {}
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|text| !text.trim().is_empty())
}

fn validate_loop(params: &LoopParams, site: &ActionSite<'_>, out: &mut Vec<Diagnostic>) {
    match params.loop_type {
        LoopType::Unspecified => out.push(site.at(
            Diagnostic::error("WF_V2_LOOP_TYPE_UNSPECIFIED", format!("{} has no loop type", site.name())),
            &["loop", "loopType"],
        )),
        LoopType::Foreach => {
            if !non_blank(&params.array_source) {
                out.push(site.at(
                    Diagnostic::error(
                        "WF_V2_LOOP_ARRAY_SOURCE_REQUIRED",
                        format!("foreach {} needs an arraySource", site.name()),
                    ),
                    &["loop", "arraySource"],
                ));
            }
            if !non_blank(&params.item_variable) {
                out.push(site.at(
                    Diagnostic::warning(
                        "WF_V2_LOOP_ITEM_VARIABLE_MISSING",
                        format!("foreach {} has no itemVariable; items are bound to the default name", site.name()),
                    ),
                    &["loop", "itemVariable"],
                ));
            }
        }
        LoopType::Repeat => {
            if params.count.unwrap_or(0) <= 0 {
                out.push(site.at(
                    Diagnostic::error(
                        "WF_V2_LOOP_COUNT_REQUIRED",
                        format!("repeat {} needs a positive count", site.name()),
                    ),
                    &["loop", "count"],
                ));
            }
        }
        LoopType::While => {
            if !non_blank(&params.condition) {
                out.push(site.at(
                    Diagnostic::error(
                        "WF_V2_LOOP_CONDITION_REQUIRED",
                        format!("while {} needs a condition", site.name()),
                    ),
                    &["loop", "condition"],
                ));
            }
            if params.max_iterations.is_none() {
                out.push(site.at(
                    Diagnostic::warning(
                        "WF_V2_LOOP_MAX_ITERATIONS",
                        format!("while {} has no maxIterations bound", site.name()),
                    ),
                    &["loop", "maxIterations"],
                ));
            }
        }
    }

    if let Some(max) = params.max_iterations.filter(|max| *max > MAX_SAFE_ITERATIONS) {
        out.push(site.at(
            Diagnostic::warning(
                "WF_V2_LOOP_MAX_ITERATIONS",
                format!("{} allows {} iterations (limit {})", site.name(), max, MAX_SAFE_ITERATIONS),
            ),
            &["loop", "maxIterations"],
        ));
    }
}

fn validate_subflow(params: &SubflowParams, site: &ActionSite<'_>, out: &mut Vec<Diagnostic>) {
    match (non_blank(&params.workflow_id), non_blank(&params.workflow_path)) {
        (true, true) => out.push(site.at(
            Diagnostic::warning(
                "WF_V2_SUBFLOW_TARGET_AMBIGUOUS",
                format!("{} sets both workflowId and workflowPath; workflowId wins", site.name()),
            ),
            &["subflow"],
        )),
        (false, false) => out.push(site.at(
            Diagnostic::error(
                "WF_V2_SUBFLOW_TARGET_REQUIRED",
                format!("{} needs a workflowId or a workflowPath", site.name()),
            ),
            &["subflow"],
        )),
        _ => {}
    }
}

fn action_selector(action: &ActionDefinition) -> Option<&str> {
    let selector = match action.params()? {
        ActionParams::Click(p) | ActionParams::Hover(p) | ActionParams::Focus(p) | ActionParams::Blur(p) => {
            p.selector.as_str()
        }
        ActionParams::Type(p) => p.selector.as_str(),
        ActionParams::Select(p) => p.selector.as_str(),
        ActionParams::Assert(p) => p.selector.as_str(),
        ActionParams::Extract(p) => p.selector.as_str(),
        ActionParams::Wait(p) => p.selector.as_deref()?,
        ActionParams::Screenshot(p) => p.selector.as_deref()?,
        _ => return None,
    };
    Some(selector.trim()).filter(|selector| !selector.is_empty())
}

fn stats_v2(definition: &WorkflowDefinitionV2) -> Stats {
    let actions: Vec<&ActionDefinition> = definition.nodes.iter().filter_map(|n| n.action.as_ref()).collect();
    let selectors: Vec<&str> = actions.iter().filter_map(|action| action_selector(action)).collect();
    let unique: BTreeSet<&str> = selectors.iter().copied().collect();
    let settings = definition.settings.as_ref();
    Stats {
        node_count: definition.nodes.len(),
        edge_count: definition.edges.len(),
        selector_count: selectors.len(),
        unique_selector_count: unique.len(),
        element_wait_count: actions
            .iter()
            .filter(|action| matches!(action.params(), Some(ActionParams::Wait(w)) if non_blank(&w.selector)))
            .count(),
        has_metadata: definition.metadata.is_some(),
        has_execution_viewport: settings
            .is_some_and(|s| s.viewport_width.is_some() && s.viewport_height.is_some()),
    }
}
