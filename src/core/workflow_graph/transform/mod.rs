//! String-level rewrites applied after fixture and selector resolution.

use crate::core::workflow_graph::diagnostics::Diagnostic;
use serde_json::Value;

mod pipeline;
mod placeholders;
mod scenario;

pub use pipeline::apply_rewrites;
pub use placeholders::{extract_port, substitute_placeholders, PlaceholderTransform};
pub use scenario::{join_url, rewrite_scenarios, ScenarioResolver, ScenarioRewriteTransform};

/// In-place rewrite of a whole definition tree.
///
/// Problems are returned as diagnostics; a transform never aborts the pass.
pub trait WorkflowTransform {
    fn name(&self) -> &'static str;
    fn transform(&self, definition: &mut Value) -> Vec<Diagnostic>;
}
