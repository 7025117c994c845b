//! Selector manifest discovery, loading, and `@selector/` resolution.

use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::tokens::{
    bind_params, did_you_mean, scan, suggest, BindingIssueKind, ParamSpec, TokenKind, TokenRef,
};
use crate::core::workflow_graph::walk::{visit_strings_mut, StringSite};
use crate::utils::{cache_key, OnceCache};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

const MANIFEST_CANDIDATES: [&str; 2] = [
    "ui/src/consts/selectors.manifest.json",
    "ui/src/constants/selectors.manifest.json",
];

static RAW_TESTID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[\s*data-testid\s*[~|^$*]?="#).unwrap());

static DUP_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*/\*dup-\d+\*/").unwrap());

static PATTERN_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

static DISCOVERY: LazyLock<OnceCache<PathBuf, Arc<ManifestLocation>>> = LazyLock::new(OnceCache::new);

static MANIFESTS: LazyLock<OnceCache<PathBuf, ManifestLoad>> = LazyLock::new(OnceCache::new);

/// Where the manifest for a scenario root was found, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    pub path: Option<PathBuf>,
    /// `discovered:<candidate>` or `none`.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSelector {
    #[serde(alias = "pattern")]
    pub selector_pattern: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StaticEntry {
    Literal(String),
    Entry { selector: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    #[serde(default)]
    selectors: BTreeMap<String, StaticEntry>,
    #[serde(default)]
    dynamic_selectors: BTreeMap<String, DynamicSelector>,
}

/// Parsed selector manifest. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorManifest {
    pub path: Option<PathBuf>,
    pub selectors: BTreeMap<String, String>,
    pub dynamic_selectors: BTreeMap<String, DynamicSelector>,
}

/// Why a single selector token could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorIssue {
    Unknown { suggestions: Vec<String> },
    Param { kind: BindingIssueKind, message: String },
}

impl SelectorManifest {
    pub fn from_json(raw: &str, path: Option<PathBuf>) -> Result<Self, serde_json::Error> {
        let file: ManifestFile = serde_json::from_str(raw)?;
        Ok(Self {
            path,
            selectors: file
                .selectors
                .into_iter()
                .map(|(id, entry)| match entry {
                    StaticEntry::Literal(selector) | StaticEntry::Entry { selector } => (id, selector),
                })
                .collect(),
            dynamic_selectors: file.dynamic_selectors,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selectors.contains_key(id) || self.dynamic_selectors.contains_key(id)
    }

    pub fn ids(&self) -> BTreeSet<&String> {
        self.selectors.keys().chain(self.dynamic_selectors.keys()).collect()
    }

    pub fn suggestions(&self, id: &str) -> Vec<String> {
        suggest(id, self.ids(), &['.'])
    }

    /// Resolve one token to a selector literal.
    ///
    /// Static entries match only tokens without arguments; a token with
    /// arguments falls back to the dynamic map.
    pub fn resolve(&self, token: &TokenRef) -> Result<String, Vec<SelectorIssue>> {
        if !token.has_args {
            if let Some(literal) = self.selectors.get(&token.id) {
                return Ok(literal.clone());
            }
        }

        if let Some(dynamic) = self.dynamic_selectors.get(&token.id) {
            let (bound, issues) = bind_params(&dynamic.params, &token.args);
            if !issues.is_empty() {
                return Err(issues
                    .into_iter()
                    .map(|issue| SelectorIssue::Param {
                        kind: issue.kind,
                        message: issue.message,
                    })
                    .collect());
            }
            let rendered = PATTERN_PLACEHOLDER.replace_all(&dynamic.selector_pattern, |caps: &regex::Captures<'_>| {
                bound
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            });
            return Ok(rendered.into_owned());
        }

        if self.selectors.contains_key(&token.id) {
            return Err(token
                .args
                .iter()
                .map(|arg| SelectorIssue::Param {
                    kind: BindingIssueKind::Unknown,
                    message: format!("selector `{}` takes no parameters, got `{}`", token.id, arg.key),
                })
                .collect());
        }

        Err(vec![SelectorIssue::Unknown {
            suggestions: self.suggestions(&token.id),
        }])
    }

    fn path_hint(&self) -> String {
        match &self.path {
            Some(path) => format!("manifest: {}", path.display()),
            None => "manifest: <in-memory>".to_string(),
        }
    }
}

/// Outcome of loading a manifest. Failures degrade to "no manifest".
#[derive(Debug, Clone)]
pub enum ManifestLoad {
    NotFound,
    Loaded(Arc<SelectorManifest>),
    Failed { path: PathBuf, reason: String },
}

impl ManifestLoad {
    pub fn manifest(&self) -> Option<&Arc<SelectorManifest>> {
        match self {
            ManifestLoad::Loaded(manifest) => Some(manifest),
            _ => None,
        }
    }
}

/// Find the manifest for a scenario root by walking upward through the
/// candidate paths. The answer is cached per root.
///
/// An explicit manifest (`paths.selector_manifest` or
/// `PLAYCHECK_SELECTOR_MANIFEST`) never reaches this function; the config
/// loader resolves it and [`ScenarioContext`] loads it directly.
///
/// [`ScenarioContext`]: crate::core::workflow_graph::ScenarioContext
pub fn discover_manifest(root: &Path) -> Arc<ManifestLocation> {
    let key = cache_key(root);
    DISCOVERY.get_or_init(&key, || {
        let location = locate(&key);
        debug!(root = %key.display(), source = %location.source, "selector manifest discovery");
        Arc::new(location)
    })
}

fn locate(root: &Path) -> ManifestLocation {
    let mut candidates: Vec<String> = MANIFEST_CANDIDATES.iter().map(|c| c.to_string()).collect();
    if let Some(name) = root.file_name().and_then(|name| name.to_str()) {
        candidates.push(format!("scenarios/{}/ui/src/consts/selectors.manifest.json", name));
    }

    for dir in root.ancestors() {
        for candidate in &candidates {
            let path = dir.join(candidate);
            if path.is_file() {
                return ManifestLocation {
                    path: Some(path),
                    source: format!("discovered:{}", candidate),
                };
            }
        }
    }

    ManifestLocation {
        path: None,
        source: "none".to_string(),
    }
}

/// Load (once per canonical path) the manifest at `path`.
pub fn load_manifest(path: &Path) -> ManifestLoad {
    let key = cache_key(path);
    MANIFESTS.get_or_init(&key, || match fs::read_to_string(&key) {
        Ok(raw) => match SelectorManifest::from_json(&raw, Some(key.clone())) {
            Ok(manifest) => {
                debug!(
                    path = %key.display(),
                    selectors = manifest.selectors.len(),
                    dynamic = manifest.dynamic_selectors.len(),
                    "loaded selector manifest"
                );
                ManifestLoad::Loaded(Arc::new(manifest))
            }
            Err(err) => {
                warn!(path = %key.display(), error = %err, "selector manifest is not valid; continuing without it");
                ManifestLoad::Failed {
                    path: key.clone(),
                    reason: err.to_string(),
                }
            }
        },
        Err(err) => {
            warn!(path = %key.display(), error = %err, "selector manifest is unreadable; continuing without it");
            ManifestLoad::Failed {
                path: key.clone(),
                reason: err.to_string(),
            }
        }
    })
}

/// Discover and load the manifest for a scenario root.
pub fn manifest_for_root(root: &Path) -> ManifestLoad {
    match &discover_manifest(root).path {
        Some(path) => load_manifest(path),
        None => ManifestLoad::NotFound,
    }
}

/// Strip `/*dup-N*/` disambiguation comments.
pub fn strip_dup_suffixes(text: &str) -> String {
    DUP_SUFFIX.replace_all(text, "").into_owned()
}

pub fn contains_raw_testid(text: &str) -> bool {
    RAW_TESTID.is_match(text)
}

/// Replace every `@selector/` token in `definition` in place.
///
/// Each failing occurrence yields its own diagnostic and is left untouched;
/// raw `[data-testid=...]` literals are rejected.
pub fn resolve_selectors(definition: &mut Value, manifest: Option<&SelectorManifest>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    visit_strings_mut(definition, "", &mut |text, site| {
        if contains_raw_testid(text) {
            diagnostics.push(
                located(Diagnostic::error(
                    "WF_SELECTOR_RAW_TESTID",
                    format!("raw data-testid selector `{}`", text),
                ), site)
                .with_hint("reference the selector manifest with @selector/<id> instead"),
            );
        }

        let scanned = scan(text, TokenKind::Selector);
        if scanned.is_empty() {
            return;
        }

        let mut rewritten = String::with_capacity(text.len());
        let mut cursor = 0;
        for item in scanned {
            match item {
                Ok(token) => {
                    rewritten.push_str(&text[cursor..token.start]);
                    match resolve_one(&token, manifest) {
                        Ok(literal) => rewritten.push_str(&literal),
                        Err(found) => {
                            rewritten.push_str(&text[token.start..token.end]);
                            diagnostics.extend(found.into_iter().map(|d| located(d, site)));
                        }
                    }
                    cursor = token.end;
                }
                Err(malformed) => {
                    rewritten.push_str(&text[cursor..malformed.end]);
                    cursor = malformed.end;
                    diagnostics.push(located(
                        Diagnostic::error(
                            "WF_SELECTOR_INVALID_SYNTAX",
                            format!("malformed selector reference `{}`: {}", malformed.raw, malformed.error),
                        ),
                        site,
                    ));
                }
            }
        }
        rewritten.push_str(&text[cursor..]);
        *text = strip_dup_suffixes(&rewritten);
    });
    diagnostics
}

fn resolve_one(token: &TokenRef, manifest: Option<&SelectorManifest>) -> Result<String, Vec<Diagnostic>> {
    let Some(manifest) = manifest else {
        return Err(vec![Diagnostic::error(
            "WF_SELECTOR_UNRESOLVED",
            format!("selector `{}` cannot be resolved", token.id),
        )
        .with_hint("no selector manifest was found for this scenario")]);
    };
    manifest.resolve(token).map_err(|issues| {
        issues
            .into_iter()
            .map(|issue| match issue {
                SelectorIssue::Unknown { suggestions } => {
                    let hint = match did_you_mean(&suggestions) {
                        Some(hint) => format!("{}; {}", hint, manifest.path_hint()),
                        None => manifest.path_hint(),
                    };
                    Diagnostic::error(
                        "WF_SELECTOR_UNRESOLVED",
                        format!("selector `{}` is not in the manifest", token.id),
                    )
                    .with_hint(hint)
                }
                SelectorIssue::Param { kind, message } => Diagnostic::error(
                    match kind {
                        BindingIssueKind::Missing => "WF_SELECTOR_PARAM_MISSING",
                        BindingIssueKind::Unknown => "WF_SELECTOR_PARAM_UNKNOWN",
                        BindingIssueKind::Invalid => "WF_SELECTOR_PARAM_INVALID",
                    },
                    format!("selector `{}`: {}", token.id, message),
                )
                .with_hint(manifest.path_hint()),
            })
            .collect()
    })
}

fn located(diagnostic: Diagnostic, site: &StringSite<'_>) -> Diagnostic {
    let diagnostic = diagnostic
        .with_node(site.scope.id(), site.scope.node_type())
        .with_pointer(site.pointer);
    match site.key {
        Some(key) => diagnostic.with_field(key),
        None => diagnostic,
    }
}
