use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;

use super::schema::SCHEMA_VERSION;

/// Diagnostic severity. Errors block dispatch; warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Error => 2,
            Severity::Warning => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single machine-readable finding.
///
/// Codes are stable identifiers (`WF_` for v1 lint/schema/resolution,
/// `WF_V2_` for the typed validator, `PF_` for preflight). The locators are
/// all optional; `pointer` is a JSON pointer into the source definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            node_id: None,
            node_type: None,
            field: None,
            pointer: None,
            hint: None,
            file: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Attach the enclosing node. Empty ids and types are dropped.
    pub fn with_node(mut self, node_id: Option<&str>, node_type: Option<&str>) -> Self {
        self.node_id = node_id.filter(|id| !id.is_empty()).map(ToOwned::to_owned);
        self.node_type = node_type.filter(|ty| !ty.is_empty()).map(ToOwned::to_owned);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)?;
        if let Some(pointer) = &self.pointer {
            write!(f, " (at {})", pointer)?;
        }
        Ok(())
    }
}

/// Canonical total order: errors first, then code, node id, message.
pub fn canonical_cmp(a: &Diagnostic, b: &Diagnostic) -> Ordering {
    b.severity
        .rank()
        .cmp(&a.severity.rank())
        .then_with(|| a.code.cmp(&b.code))
        .then_with(|| a.node_id.cmp(&b.node_id))
        .then_with(|| a.message.cmp(&b.message))
}

/// Sort in canonical order. The sort is stable, so equal keys keep emission order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(canonical_cmp);
}

/// Split a mixed list into canonically ordered `(errors, warnings)`.
pub fn partition(diagnostics: Vec<Diagnostic>) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
    let (mut errors, mut warnings): (Vec<_>, Vec<_>) =
        diagnostics.into_iter().partition(Diagnostic::is_error);
    sort_diagnostics(&mut errors);
    sort_diagnostics(&mut warnings);
    (errors, warnings)
}

/// Counts reported alongside every v1 validation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub node_count: usize,
    pub edge_count: usize,
    pub selector_count: usize,
    pub unique_selector_count: usize,
    pub element_wait_count: usize,
    pub has_metadata: bool,
    pub has_execution_viewport: bool,
}

/// Result document of a v1 (or V2) validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub stats: Stats,
    pub schema_version: String,
    pub checked_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ValidationResult {
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>, stats: Stats, started: Instant) -> Self {
        let (errors, warnings) = partition(diagnostics);
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            stats,
            schema_version: SCHEMA_VERSION.to_string(),
            checked_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Iterate errors then warnings, preserving canonical order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.diagnostics().any(|diagnostic| diagnostic.code == code)
    }
}
