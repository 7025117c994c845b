use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::transform::placeholders::PlaceholderTransform;
use crate::core::workflow_graph::transform::scenario::{ScenarioResolver, ScenarioRewriteTransform};
use crate::core::workflow_graph::transform::WorkflowTransform;
use serde_json::Value;
use tracing::debug;

/// Scenario rewriting, then placeholder substitution.
pub fn apply_rewrites(
    definition: &mut Value,
    base_url: &str,
    resolver: Option<&dyn ScenarioResolver>,
) -> Vec<Diagnostic> {
    let transforms: Vec<Box<dyn WorkflowTransform + '_>> = vec![
        Box::new(ScenarioRewriteTransform { resolver }),
        Box::new(PlaceholderTransform { base_url }),
    ];
    let mut diagnostics = Vec::new();
    for transform in transforms {
        let found = transform.transform(definition);
        debug!(transform = transform.name(), diagnostics = found.len(), "applied rewrite");
        diagnostics.extend(found);
    }
    diagnostics
}
