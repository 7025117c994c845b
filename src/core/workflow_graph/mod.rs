//! Validation, resolution and preflight for JSON playbook definitions.

pub mod clean;
pub mod diagnostics;
pub mod fixtures;
pub mod lint;
pub mod pipeline;
pub mod preflight;
pub mod schema;
pub mod seed;
pub mod selectors;
pub mod tokens;
pub mod transform;
pub mod v2;
pub mod walk;

pub use diagnostics::{Diagnostic, Severity, Stats, ValidationResult};
pub use pipeline::{Pipeline, ResolvedWorkflow, ScenarioContext, ValidateOptions};
pub use preflight::{AggregateReport, PreflightReport, TokenCounts};
