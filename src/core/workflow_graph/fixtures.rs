//! Fixture catalogue and `@fixture/` inlining.
//!
//! A fixture is a reusable workflow fragment stored as JSON under the
//! scenario's fixtures directory. Subflow nodes reference one with
//! `workflowId: "@fixture/<slug>(k=v, ...)"`; resolution binds the arguments,
//! substitutes `${fixture.<name>}` placeholders, and replaces the reference
//! with an inline `workflowDefinition`, recursing until no references remain.

use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::tokens::{
    bind_params, did_you_mean, parse_exact, scan, suggest, BindingIssueKind, ParamSpec, TokenKind,
};
use crate::core::workflow_graph::walk::{pointer_index, pointer_push, visit_strings, visit_strings_mut};
use crate::utils::{cache_key, OnceCache};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};
use walkdir::WalkDir;

static FIXTURE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{fixture\.([A-Za-z0-9_\-]+)\}").unwrap());

static MODULES: LazyLock<OnceCache<PathBuf, Result<Arc<FixtureModule>, String>>> =
    LazyLock::new(OnceCache::new);

const SLUG_SEPARATORS: &[char] = &['-', '.', '/', '_'];

/// Reset policy a fixture requests before it runs. Ordered: unset < none < full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResetPolicy {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "none")]
    None,
    #[serde(rename = "full")]
    Full,
}

impl ResetPolicy {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "none" => ResetPolicy::None,
            "full" => ResetPolicy::Full,
            _ => ResetPolicy::Unset,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPolicy::Unset => "",
            ResetPolicy::None => "none",
            ResetPolicy::Full => "full",
        }
    }

    /// The stronger of two policies.
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    /// Unset resolves to `none` on output.
    pub fn or_none(self) -> Self {
        match self {
            ResetPolicy::Unset => ResetPolicy::None,
            other => other,
        }
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FixtureMetadata {
    #[serde(default)]
    fixture_id: Option<String>,
    #[serde(default)]
    parameters: Vec<ParamSpec>,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    reset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    metadata: FixtureMetadata,
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default)]
    edges: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct FixtureHeader {
    #[serde(default)]
    metadata: Option<HeaderMetadata>,
}

#[derive(Debug, Deserialize)]
struct HeaderMetadata {
    #[serde(default)]
    fixture_id: Option<String>,
}

/// A parsed fixture file. Immutable once cached.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureModule {
    pub id: String,
    pub path: PathBuf,
    pub parameters: Vec<ParamSpec>,
    pub requirements: Vec<String>,
    pub reset: ResetPolicy,
    pub nodes: Vec<Value>,
    pub edges: Vec<Value>,
}

impl FixtureModule {
    pub fn parse(raw: &str, path: &Path, fallback_id: &str) -> Result<Self, serde_json::Error> {
        let file: FixtureFile = serde_json::from_str(raw)?;
        Ok(Self {
            id: file
                .metadata
                .fixture_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| fallback_id.to_string()),
            path: path.to_path_buf(),
            parameters: file.metadata.parameters,
            requirements: file.metadata.requirements,
            reset: file
                .metadata
                .reset
                .as_deref()
                .map(ResetPolicy::parse)
                .unwrap_or_default(),
            nodes: file.nodes,
            edges: file.edges,
        })
    }

    /// The fixture body as a fresh definition value.
    pub fn body(&self) -> Value {
        json!({ "nodes": self.nodes, "edges": self.edges })
    }
}

/// Load a fixture module, once per canonical path.
pub fn load_module(path: &Path, fallback_id: &str) -> Result<Arc<FixtureModule>, String> {
    let key = cache_key(path);
    MODULES.get_or_init(&key, || {
        let raw = fs::read_to_string(&key).map_err(|err| format!("cannot read {}: {}", key.display(), err))?;
        let module = FixtureModule::parse(&raw, &key, fallback_id)
            .map_err(|err| format!("invalid fixture {}: {}", key.display(), err))?;
        debug!(fixture = %module.id, path = %key.display(), "loaded fixture");
        Ok(Arc::new(module))
    })
}

/// Fixture ids discovered under a fixtures directory.
#[derive(Debug, Clone, Default)]
pub struct FixtureCatalog {
    dir: PathBuf,
    index: BTreeMap<String, PathBuf>,
}

impl FixtureCatalog {
    /// Scan `dir` for `*.json` files. A missing directory yields an empty catalogue.
    pub fn discover(dir: &Path) -> Self {
        let mut index = BTreeMap::new();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "fixtures directory not found");
            return Self {
                dir: dir.to_path_buf(),
                index,
            };
        }

        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false))
        {
            let path = entry.path();
            let derived = derived_id(dir, path);
            let id = read_declared_id(path).unwrap_or(derived);
            if let Some(existing) = index.get(&id) {
                warn!(
                    fixture = %id,
                    kept = %existing.display(),
                    ignored = %path.display(),
                    "duplicate fixture id"
                );
                continue;
            }
            index.insert(id, path.to_path_buf());
        }

        debug!(dir = %dir.display(), fixtures = index.len(), "discovered fixtures");
        Self {
            dir: dir.to_path_buf(),
            index,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.index.keys()
    }

    pub fn suggestions(&self, id: &str) -> Vec<String> {
        suggest(id, self.index.keys(), SLUG_SEPARATORS)
    }

    /// `None` when the id is not catalogued.
    pub fn load(&self, id: &str) -> Option<Result<Arc<FixtureModule>, String>> {
        self.index.get(id).map(|path| load_module(path, id))
    }
}

fn derived_id(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_declared_id(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let header: FixtureHeader = serde_json::from_str(&raw).ok()?;
    header
        .metadata?
        .fixture_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Outcome of fixture expansion over one definition.
#[derive(Debug, Clone, Default)]
pub struct FixtureExpansion {
    pub diagnostics: Vec<Diagnostic>,
    /// Requirements of every inlined fixture, deduplicated, first-seen order.
    pub requirements: Vec<String>,
    /// Strongest reset policy among inlined fixtures.
    pub reset: ResetPolicy,
    pub inlined: usize,
}

impl FixtureExpansion {
    fn add_requirements(&mut self, requirements: &[String]) {
        for requirement in requirements {
            if !self.requirements.contains(requirement) {
                self.requirements.push(requirement.clone());
            }
        }
    }
}

/// Inline every `@fixture/` reference in `definition`, in place.
///
/// Nodes are visited in source order and each inlined body is expanded
/// before moving on. A failing reference is left in place with an error;
/// the rest of the pass continues.
pub fn expand_fixtures(definition: &mut Value, catalog: &FixtureCatalog) -> FixtureExpansion {
    let mut expansion = FixtureExpansion::default();
    let mut stack = Vec::new();
    expand_graph(definition, "", catalog, &mut stack, &mut expansion);
    report_leftovers(definition, &mut expansion.diagnostics);

    if !expansion.requirements.is_empty() {
        merge_requirements_into(definition, &expansion.requirements);
    }
    expansion
}

fn expand_graph(
    definition: &mut Value,
    prefix: &str,
    catalog: &FixtureCatalog,
    stack: &mut Vec<String>,
    expansion: &mut FixtureExpansion,
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
        let inline_pointer = pointer_push(&data_pointer, "workflowDefinition");
        let at = |diagnostic: Diagnostic, field: &str| {
            diagnostic
                .with_node(node_id.as_deref(), node_type.as_deref())
                .with_field(field)
                .with_pointer(pointer_push(&data_pointer, field))
        };

        let reference = data
            .get("workflowId")
            .and_then(Value::as_str)
            .filter(|id| id.trim_start().starts_with(TokenKind::Fixture.prefix()))
            .map(ToOwned::to_owned);

        let Some(reference) = reference else {
            if let Some(inline) = data.get_mut("workflowDefinition").filter(|v| v.is_object()) {
                expand_graph(inline, &inline_pointer, catalog, stack, expansion);
            }
            continue;
        };

        let token = match parse_exact(&reference, TokenKind::Fixture) {
            Ok(token) => token,
            Err(err) => {
                expansion.diagnostics.push(at(
                    Diagnostic::error(
                        "WF_FIXTURE_INVALID_SYNTAX",
                        format!("malformed fixture reference `{}`: {}", reference.trim(), err),
                    ),
                    "workflowId",
                ));
                continue;
            }
        };
        let slug = token.id.clone();

        if stack.contains(&slug) {
            let mut chain = stack.clone();
            chain.push(slug.clone());
            expansion.diagnostics.push(at(
                Diagnostic::error(
                    "WF_FIXTURE_CYCLE",
                    format!("fixture cycle: {}", chain.join(" -> ")),
                ),
                "workflowId",
            ));
            continue;
        }

        let module = match catalog.load(&slug) {
            None => {
                let mut diagnostic = at(
                    Diagnostic::error("WF_FIXTURE_NOT_FOUND", format!("fixture `{}` not found", slug)),
                    "workflowId",
                );
                let hint = match did_you_mean(&catalog.suggestions(&slug)) {
                    Some(hint) => format!("{}; fixtures dir: {}", hint, catalog.dir().display()),
                    None => format!("fixtures dir: {}", catalog.dir().display()),
                };
                diagnostic = diagnostic.with_hint(hint);
                expansion.diagnostics.push(diagnostic);
                continue;
            }
            Some(Err(reason)) => {
                expansion.diagnostics.push(at(
                    Diagnostic::error(
                        "WF_FIXTURE_LOAD_FAILED",
                        format!("fixture `{}` failed to load: {}", slug, reason),
                    ),
                    "workflowId",
                ));
                continue;
            }
            Some(Ok(module)) => module,
        };

        let (bound, issues) = bind_params(&module.parameters, &token.args);
        if !issues.is_empty() {
            for issue in issues {
                let code = match issue.kind {
                    BindingIssueKind::Missing => "WF_FIXTURE_PARAM_MISSING",
                    BindingIssueKind::Unknown => "WF_FIXTURE_PARAM_UNKNOWN",
                    BindingIssueKind::Invalid => "WF_FIXTURE_PARAM_INVALID",
                };
                expansion.diagnostics.push(at(
                    Diagnostic::error(code, format!("fixture `{}`: {}", slug, issue.message)),
                    "workflowId",
                ));
            }
            continue;
        }

        let mut body = module.body();
        substitute_placeholders(&mut body, &bound, &slug, &inline_pointer, &mut expansion.diagnostics);

        expansion.add_requirements(&module.requirements);
        expansion.reset = expansion.reset.merge(module.reset);
        expansion.inlined += 1;

        stack.push(slug);
        expand_graph(&mut body, &inline_pointer, catalog, stack, expansion);
        stack.pop();

        data.remove("workflowId");
        data.insert("workflowDefinition".to_string(), body);
    }
}

/// Replace `${fixture.<name>}` with bound values; undeclared names are errors.
fn substitute_placeholders(
    body: &mut Value,
    bound: &BTreeMap<String, String>,
    slug: &str,
    pointer: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    visit_strings_mut(body, pointer, &mut |text, site| {
        if !text.contains("${fixture.") {
            return;
        }
        let replaced = FIXTURE_PLACEHOLDER
            .replace_all(text, |caps: &regex::Captures<'_>| match bound.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    let mut diagnostic = Diagnostic::error(
                        "WF_FIXTURE_PLACEHOLDER_UNDECLARED",
                        format!("fixture `{}` uses undeclared parameter `{}`", slug, &caps[1]),
                    )
                    .with_node(site.scope.id(), site.scope.node_type())
                    .with_pointer(site.pointer);
                    if let Some(key) = site.key {
                        diagnostic = diagnostic.with_field(key);
                    }
                    diagnostics.push(diagnostic);
                    caps[0].to_string()
                }
            })
            .into_owned();
        *text = replaced;
    });
}

/// `@fixture/` tokens outside a subflow `workflowId` are never expanded.
fn report_leftovers(definition: &Value, diagnostics: &mut Vec<Diagnostic>) {
    visit_strings(definition, "", &mut |text, site| {
        if site.key == Some("workflowId") {
            return;
        }
        for token in scan(text, TokenKind::Fixture).into_iter().flatten() {
            let mut diagnostic = Diagnostic::error(
                "WF_FIXTURE_UNRESOLVED",
                format!("fixture reference `@fixture/{}` is only expanded in a subflow `workflowId`", token.id),
            )
            .with_node(site.scope.id(), site.scope.node_type())
            .with_pointer(site.pointer);
            if let Some(key) = site.key {
                diagnostic = diagnostic.with_field(key);
            }
            diagnostics.push(diagnostic);
        }
    });
}

fn merge_requirements_into(definition: &mut Value, requirements: &[String]) {
    let Some(root) = definition.as_object_mut() else {
        return;
    };
    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    if !metadata.is_object() {
        *metadata = Value::Object(Map::new());
    }
    let Some(metadata) = metadata.as_object_mut() else {
        return;
    };
    let merged = metadata
        .entry("requirementsFromFixtures")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !merged.is_array() {
        *merged = Value::Array(Vec::new());
    }
    if let Some(items) = merged.as_array_mut() {
        for requirement in requirements {
            let value = Value::String(requirement.clone());
            if !items.contains(&value) {
                items.push(value);
            }
        }
    }
}
