use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::transform::WorkflowTransform;
use crate::core::workflow_graph::walk::{lowered, pointer_index, pointer_push};
use serde_json::{Map, Value};

/// Maps a scenario name to its UI base URL.
pub trait ScenarioResolver: Send + Sync {
    fn resolve(&self, scenario: &str) -> anyhow::Result<String>;
}

impl<F> ScenarioResolver for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn resolve(&self, scenario: &str) -> anyhow::Result<String> {
        self(scenario)
    }
}

/// Rewrites `destinationType: scenario` navigate nodes into plain URL navigation.
pub struct ScenarioRewriteTransform<'a> {
    pub resolver: Option<&'a dyn ScenarioResolver>,
}

impl WorkflowTransform for ScenarioRewriteTransform<'_> {
    fn name(&self) -> &'static str {
        "ScenarioRewriteTransform"
    }

    fn transform(&self, definition: &mut Value) -> Vec<Diagnostic> {
        match self.resolver {
            Some(resolver) => rewrite_scenarios(definition, resolver),
            None => Vec::new(),
        }
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Rewrite scenario navigation in source order, depth-first into nested definitions.
pub fn rewrite_scenarios(definition: &mut Value, resolver: &dyn ScenarioResolver) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    rewrite_graph(definition, "", resolver, &mut diagnostics);
    diagnostics
}

fn rewrite_graph(
    definition: &mut Value,
    prefix: &str,
    resolver: &dyn ScenarioResolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(nodes) = definition.get_mut("nodes").and_then(Value::as_array_mut) else {
        return;
    };
    let nodes_pointer = pointer_push(prefix, "nodes");

    for (index, node) in nodes.iter_mut().enumerate() {
        let node_pointer = pointer_index(&nodes_pointer, index);
        let node_id = node.get("id").and_then(Value::as_str).map(ToOwned::to_owned);
        let node_type = node.get("type").and_then(Value::as_str).map(ToOwned::to_owned);
        let Some(data) = node.get_mut("data").and_then(Value::as_object_mut) else {
            continue;
        };
        let data_pointer = pointer_push(&node_pointer, "data");

        if node_type.as_deref() == Some("navigate") && lowered(data, "destinationType") == "scenario" {
            let site = NodeSite {
                id: node_id.as_deref(),
                index,
                data_pointer: &data_pointer,
            };
            rewrite_node(data, &site, resolver, diagnostics);
        }

        if let Some(inline) = data.get_mut("workflowDefinition").filter(|v| v.is_object()) {
            let inline_pointer = pointer_push(&data_pointer, "workflowDefinition");
            rewrite_graph(inline, &inline_pointer, resolver, diagnostics);
        }
    }
}

struct NodeSite<'a> {
    id: Option<&'a str>,
    index: usize,
    data_pointer: &'a str,
}

impl NodeSite<'_> {
    fn locate(&self, diagnostic: Diagnostic, field: &str) -> Diagnostic {
        diagnostic
            .with_node(self.id, Some("navigate"))
            .with_field(field)
            .with_pointer(pointer_push(self.data_pointer, field))
    }

    fn describe(&self) -> String {
        match self.id {
            Some(id) => format!("navigate node `{}` (index {})", id, self.index),
            None => format!("navigate node at index {}", self.index),
        }
    }
}

fn rewrite_node(
    data: &mut Map<String, Value>,
    site: &NodeSite<'_>,
    resolver: &dyn ScenarioResolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let scenario = data
        .get("scenario")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    if scenario.is_empty() {
        diagnostics.push(site.locate(
            Diagnostic::error(
                "WF_SCENARIO_NAME_MISSING",
                format!("{} navigates to a scenario but names none", site.describe()),
            ),
            "scenario",
        ));
        return;
    }

    let path = match data.get("scenarioPath") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(path)) => path.trim().to_string(),
        Some(other) => {
            diagnostics.push(site.locate(
                Diagnostic::warning(
                    "WF_SCENARIO_PATH_INVALID",
                    format!(
                        "{} has a non-string scenarioPath ({}); using an empty path",
                        site.describe(),
                        other
                    ),
                ),
                "scenarioPath",
            ));
            String::new()
        }
    };

    let base = match resolver.resolve(&scenario) {
        Ok(base) => base,
        Err(err) => {
            diagnostics.push(site.locate(
                Diagnostic::error(
                    "WF_SCENARIO_RESOLVE_FAILED",
                    format!("{}: scenario `{}` could not be resolved: {}", site.describe(), scenario, err),
                ),
                "scenario",
            ));
            return;
        }
    };

    data.insert("destinationType".to_string(), Value::String("url".to_string()));
    data.insert("url".to_string(), Value::String(join_url(&base, &path)));
    data.remove("scenario");
    data.remove("scenarioPath");
}
