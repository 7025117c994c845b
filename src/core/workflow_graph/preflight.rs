//! Static reference scan that never performs resolution.
//!
//! Preflight counts every `@fixture/`, `@selector/` and `@seed/` token,
//! checks fixture references against the discovered catalogue, and lists the
//! scenarios a workflow navigates to. Selector tokens are counted only;
//! whether they resolve is left to the execution backend.

use crate::core::workflow_graph::diagnostics::{sort_diagnostics, Diagnostic};
use crate::core::workflow_graph::fixtures::FixtureCatalog;
use crate::core::workflow_graph::schema::load_definition;
use crate::core::workflow_graph::tokens::{did_you_mean, scan, TokenKind};
use crate::core::workflow_graph::walk::{
    lowered, nodes_of, non_empty_str, pointer_index, pointer_push, visit_strings,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub fixtures: usize,
    pub selectors: usize,
    pub seeds: usize,
}

impl TokenCounts {
    fn add(&mut self, other: &TokenCounts) {
        self.fixtures += other.fixtures;
        self.selectors += other.selectors;
        self.seeds += other.seeds;
    }
}

/// Preflight result for a single workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightReport {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub token_counts: TokenCounts,
    pub required_scenarios: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl PreflightReport {
    fn from_parts(
        diagnostics: Vec<Diagnostic>,
        token_counts: TokenCounts,
        required_scenarios: Vec<String>,
        file: Option<String>,
    ) -> Self {
        let (mut errors, mut warnings): (Vec<_>, Vec<_>) =
            diagnostics.into_iter().partition(Diagnostic::is_error);
        sort_diagnostics(&mut errors);
        sort_diagnostics(&mut warnings);
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            token_counts,
            required_scenarios,
            file,
        }
    }
}

/// Preflight results merged across many workflows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub valid: bool,
    pub workflow_count: usize,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub token_counts: TokenCounts,
    pub required_scenarios: Vec<String>,
}

/// Scan an in-memory definition. `file` is stamped on every diagnostic.
pub fn preflight_definition(
    definition: &Value,
    catalog: &FixtureCatalog,
    file: Option<&str>,
) -> PreflightReport {
    let mut diagnostics = Vec::new();
    let mut counts = TokenCounts::default();

    visit_strings(definition, "", &mut |text, site| {
        for scanned in scan(text, TokenKind::Fixture) {
            counts.fixtures += 1;
            match scanned {
                Ok(token) if !catalog.contains(&token.id) => {
                    let mut diagnostic = Diagnostic::error(
                        "PF_FIXTURE_NOT_FOUND",
                        format!("fixture `{}` is not in {}", token.id, catalog.dir().display()),
                    )
                    .with_node(site.scope.id(), site.scope.node_type())
                    .with_pointer(site.pointer);
                    if let Some(hint) = did_you_mean(&catalog.suggestions(&token.id)) {
                        diagnostic = diagnostic.with_hint(hint);
                    }
                    diagnostics.push(diagnostic);
                }
                Ok(_) => {}
                Err(malformed) => diagnostics.push(
                    Diagnostic::error(
                        "PF_FIXTURE_INVALID_SYNTAX",
                        format!("malformed fixture reference `{}`: {}", malformed.raw, malformed.error),
                    )
                    .with_node(site.scope.id(), site.scope.node_type())
                    .with_pointer(site.pointer),
                ),
            }
        }
        counts.selectors += scan(text, TokenKind::Selector).len();
        counts.seeds += scan(text, TokenKind::Seed).len();
    });

    if counts.seeds > 0 {
        diagnostics.push(
            Diagnostic::warning(
                "PF_SEED_RUNTIME_DEPENDENCY",
                format!(
                    "workflow uses {} seed reference(s) that resolve only at execution time",
                    counts.seeds
                ),
            )
            .with_hint("make sure the scenario seed state provides every referenced key"),
        );
    }

    let mut scenarios = BTreeSet::new();
    collect_scenarios(definition, "", &mut scenarios, &mut diagnostics);

    if let Some(file) = file {
        diagnostics = diagnostics
            .into_iter()
            .map(|diagnostic| diagnostic.with_file(file))
            .collect();
    }

    PreflightReport::from_parts(
        diagnostics,
        counts,
        scenarios.into_iter().collect(),
        file.map(ToOwned::to_owned),
    )
}

fn collect_scenarios(
    definition: &Value,
    prefix: &str,
    scenarios: &mut BTreeSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let nodes_pointer = pointer_push(prefix, "nodes");
    for (index, node) in nodes_of(definition).iter().enumerate() {
        let Some(data) = node.get("data").and_then(Value::as_object) else {
            continue;
        };
        let data_pointer = pointer_push(&pointer_index(&nodes_pointer, index), "data");
        let node_type = node.get("type").and_then(Value::as_str);

        if node_type == Some("navigate") && lowered(data, "destinationType") == "scenario" {
            match non_empty_str(data, "scenario") {
                Some(name) => {
                    scenarios.insert(name.to_string());
                }
                None => {
                    let id = node.get("id").and_then(Value::as_str);
                    diagnostics.push(
                        Diagnostic::error(
                            "PF_SCENARIO_NAME_MISSING",
                            format!("navigate node at index {} targets a scenario without a name", index),
                        )
                        .with_node(id, node_type)
                        .with_field("scenario")
                        .with_pointer(pointer_push(&data_pointer, "scenario")),
                    );
                }
            }
        }

        if let Some(inline) = data.get("workflowDefinition").filter(|v| v.is_object()) {
            let inline_pointer = pointer_push(&data_pointer, "workflowDefinition");
            collect_scenarios(inline, &inline_pointer, scenarios, diagnostics);
        }
    }
}

/// Preflight one workflow file; unreadable or unparsable files are reported, not raised.
pub fn preflight_file(path: &Path, catalog: &FixtureCatalog) -> PreflightReport {
    let file = path.display().to_string();
    match load_definition(path) {
        Ok(definition) => preflight_definition(&definition, catalog, Some(&file)),
        Err(err) => {
            debug!(path = %file, error = %err, "workflow could not be loaded");
            let diagnostic = Diagnostic::error(
                "PF_WORKFLOW_LOAD_FAILED",
                format!("cannot load workflow: {}", err.message),
            )
            .with_file(file.clone());
            PreflightReport::from_parts(vec![diagnostic], TokenCounts::default(), Vec::new(), Some(file))
        }
    }
}

/// Every `*.json` under `dir`, in file-name order.
pub fn discover_workflows(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect()
}

/// Merge per-workflow reports: counts are summed, scenarios deduplicated
/// and sorted, diagnostics put in canonical order.
pub fn aggregate(reports: Vec<PreflightReport>) -> AggregateReport {
    let mut merged = AggregateReport {
        workflow_count: reports.len(),
        ..AggregateReport::default()
    };
    let mut scenarios = BTreeSet::new();
    for report in reports {
        merged.token_counts.add(&report.token_counts);
        merged.errors.extend(report.errors);
        merged.warnings.extend(report.warnings);
        scenarios.extend(report.required_scenarios);
    }
    sort_diagnostics(&mut merged.errors);
    sort_diagnostics(&mut merged.warnings);
    merged.required_scenarios = scenarios.into_iter().collect();
    merged.valid = merged.errors.is_empty();
    merged
}

/// Preflight every workflow under a playbooks directory.
pub fn preflight_dir(playbooks_dir: &Path, catalog: &FixtureCatalog) -> AggregateReport {
    let reports = discover_workflows(playbooks_dir)
        .iter()
        .map(|path| preflight_file(path, catalog))
        .collect();
    aggregate(reports)
}
