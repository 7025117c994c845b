#![allow(clippy::result_large_err)]

//! Orchestration: schema, lint, resolution and cleaning in a fixed order.
//!
//! The pipeline holds no per-request state; one instance can serve parallel
//! requests. Resolution mutates the definition it is given.

use crate::core::error::AppError;
use crate::core::workflow_graph::clean::clean_definition;
use crate::core::workflow_graph::diagnostics::{Diagnostic, Stats, ValidationResult};
use crate::core::workflow_graph::fixtures::{expand_fixtures, FixtureCatalog, ResetPolicy};
use crate::core::workflow_graph::lint::{lint_definition, LintOptions};
use crate::core::workflow_graph::preflight::{
    aggregate, preflight_definition, preflight_dir, preflight_file, AggregateReport, PreflightReport,
};
use crate::core::workflow_graph::schema::validate_schema;
use crate::core::workflow_graph::seed::{load_seed_state, SeedState};
use crate::core::workflow_graph::selectors::{load_manifest, manifest_for_root, resolve_selectors, ManifestLoad};
use crate::core::workflow_graph::transform::{apply_rewrites, ScenarioResolver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_PLAYBOOKS_DIR: &str = "test/playbooks";
pub const DEFAULT_FIXTURES_DIR: &str = "test/playbooks/__subflows";
pub const DEFAULT_SEED_STATE: &str = "test/playbooks/__seeds/seed-state.json";

/// Where a scenario keeps its playbooks, fixtures, seed state and manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioContext {
    pub root: PathBuf,
    /// UI base URL used for `${BASE_URL}` and `{{UI_PORT}}`.
    pub base_url: String,
    pub playbooks_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub seed_path: PathBuf,
    /// Explicit manifest path; `None` means discover from `root`.
    pub manifest_path: Option<PathBuf>,
}

impl ScenarioContext {
    /// Context with the conventional layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_url: String::new(),
            playbooks_dir: root.join(DEFAULT_PLAYBOOKS_DIR),
            fixtures_dir: root.join(DEFAULT_FIXTURES_DIR),
            seed_path: root.join(DEFAULT_SEED_STATE),
            manifest_path: None,
            root,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn manifest(&self) -> ManifestLoad {
        match &self.manifest_path {
            Some(path) => load_manifest(path),
            None => manifest_for_root(&self.root),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    pub strict: bool,
    /// Also run resolution and report its diagnostics.
    pub resolve: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    pub requirements_from_fixtures: Vec<String>,
    pub reset: String,
}

/// A definition ready for the execution backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedWorkflow {
    pub definition: Value,
    pub metadata: ResolvedMetadata,
    pub initial_params: SeedState,
    pub result: ValidationResult,
}

struct StageOutput {
    diagnostics: Vec<Diagnostic>,
    stats: Stats,
    resolution: Option<Resolution>,
}

struct Resolution {
    metadata: ResolvedMetadata,
    initial_params: SeedState,
}

pub struct Pipeline {
    context: ScenarioContext,
    resolver: Option<Arc<dyn ScenarioResolver>>,
    cancel: CancellationToken,
    catalog: OnceLock<FixtureCatalog>,
}

impl Pipeline {
    pub fn new(context: ScenarioContext) -> Self {
        Self {
            context,
            resolver: None,
            cancel: CancellationToken::new(),
            catalog: OnceLock::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl ScenarioResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn context(&self) -> &ScenarioContext {
        &self.context
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fixture catalogue, discovered on first use.
    pub fn catalog(&self) -> &FixtureCatalog {
        self.catalog
            .get_or_init(|| FixtureCatalog::discover(&self.context.fixtures_dir))
    }

    fn checkpoint(&self, stage: &str) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            debug!(stage, "pipeline cancelled");
            return Err(AppError::cancelled(stage));
        }
        Ok(())
    }

    /// Validate a definition. With `options.resolve` the definition is
    /// resolved on a copy and resolution diagnostics are included.
    pub fn validate(&self, definition: &Value, options: ValidateOptions) -> Result<ValidationResult, AppError> {
        let started = Instant::now();
        let mut working = definition.clone();
        let output = self.run(&mut working, options.strict, options.resolve)?;
        let result = ValidationResult::from_diagnostics(output.diagnostics, output.stats, started);
        log_result("validate", &result);
        Ok(result)
    }

    /// Resolve a definition into its cleaned, dispatchable form.
    pub fn resolve(&self, mut definition: Value, strict: bool) -> Result<ResolvedWorkflow, AppError> {
        let started = Instant::now();
        let output = self.run(&mut definition, strict, true)?;

        self.checkpoint("clean")?;
        let cleaned = clean_definition(&definition);
        let resolution = output.resolution.unwrap_or_else(|| Resolution {
            metadata: ResolvedMetadata {
                requirements_from_fixtures: Vec::new(),
                reset: ResetPolicy::None.as_str().to_string(),
            },
            initial_params: SeedState::new(),
        });

        let result = ValidationResult::from_diagnostics(output.diagnostics, output.stats, started);
        log_result("resolve", &result);
        Ok(ResolvedWorkflow {
            definition: cleaned,
            metadata: resolution.metadata,
            initial_params: resolution.initial_params,
            result,
        })
    }

    fn run(&self, definition: &mut Value, strict: bool, resolve: bool) -> Result<StageOutput, AppError> {
        self.checkpoint("schema")?;
        let schema_diagnostics = validate_schema(definition)?;
        let schema_failed = schema_diagnostics.iter().any(Diagnostic::is_error);
        debug!(diagnostics = schema_diagnostics.len(), "schema stage done");

        self.checkpoint("lint")?;
        let manifest_load = self.context.manifest();
        let mut diagnostics = schema_diagnostics;
        if let ManifestLoad::Failed { path, reason } = &manifest_load {
            diagnostics.push(
                Diagnostic::warning(
                    "WF_SELECTOR_MANIFEST_INVALID",
                    format!("selector manifest {} could not be loaded: {}", path.display(), reason),
                )
                .with_hint("selector tokens are checked as if no manifest existed"),
            );
        }
        let manifest = manifest_load.manifest().map(Arc::as_ref);
        let report = lint_definition(definition, LintOptions { strict }, manifest);
        debug!(diagnostics = report.diagnostics.len(), "lint stage done");
        diagnostics.extend(report.diagnostics);

        if !resolve {
            return Ok(StageOutput {
                diagnostics,
                stats: report.stats,
                resolution: None,
            });
        }
        if schema_failed {
            debug!("schema errors present; skipping resolution");
            return Ok(StageOutput {
                diagnostics,
                stats: report.stats,
                resolution: None,
            });
        }

        self.checkpoint("resolve")?;
        let expansion = expand_fixtures(definition, self.catalog());
        debug!(
            inlined = expansion.inlined,
            diagnostics = expansion.diagnostics.len(),
            "fixtures expanded"
        );
        diagnostics.extend(expansion.diagnostics);
        diagnostics.extend(resolve_selectors(definition, manifest));
        diagnostics.extend(apply_rewrites(
            definition,
            &self.context.base_url,
            self.resolver.as_deref(),
        ));

        let declared_reset = definition
            .pointer("/metadata/reset")
            .and_then(Value::as_str)
            .map(ResetPolicy::parse)
            .unwrap_or_default();
        let requirements_from_fixtures = definition
            .pointer("/metadata/requirementsFromFixtures")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let initial_params = match load_seed_state(&self.context.seed_path) {
            Ok(state) => state.as_ref().clone(),
            Err(reason) => {
                warn!(path = %self.context.seed_path.display(), %reason, "ignoring seed state");
                diagnostics.push(
                    Diagnostic::warning("WF_SEED_STATE_INVALID", format!("seed state ignored: {}", reason))
                        .with_hint("the seed state file must contain a JSON object"),
                );
                SeedState::new()
            }
        };

        Ok(StageOutput {
            diagnostics,
            stats: report.stats,
            resolution: Some(Resolution {
                metadata: ResolvedMetadata {
                    requirements_from_fixtures,
                    reset: declared_reset.merge(expansion.reset).or_none().as_str().to_string(),
                },
                initial_params,
            }),
        })
    }

    /// Preflight an in-memory definition.
    pub fn preflight(&self, definition: &Value, file: Option<&str>) -> Result<PreflightReport, AppError> {
        self.checkpoint("preflight")?;
        Ok(preflight_definition(definition, self.catalog(), file))
    }

    /// Preflight a single workflow file.
    pub fn preflight_file(&self, path: &Path) -> Result<PreflightReport, AppError> {
        self.checkpoint("preflight")?;
        Ok(preflight_file(path, self.catalog()))
    }

    /// Preflight the given files, checking for cancellation between files.
    pub fn preflight_files(&self, paths: &[PathBuf]) -> Result<AggregateReport, AppError> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.preflight_file(path)?);
        }
        Ok(aggregate(reports))
    }

    /// Preflight every workflow under the scenario's playbooks directory.
    pub fn preflight_scenario(&self) -> Result<AggregateReport, AppError> {
        self.checkpoint("preflight")?;
        let report = preflight_dir(&self.context.playbooks_dir, self.catalog());
        info!(
            workflows = report.workflow_count,
            valid = report.valid,
            errors = report.errors.len(),
            "scenario preflight finished"
        );
        Ok(report)
    }
}

fn log_result(operation: &str, result: &ValidationResult) {
    info!(
        operation,
        valid = result.valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        duration_ms = result.duration_ms,
        "pipeline finished"
    );
}
