#![allow(clippy::result_large_err)] // Schema APIs return AppError to keep the structured context of fatal failures.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::walk::NodeScope;
use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Version tag of the embedded workflow schema, reported in every result.
pub const SCHEMA_VERSION: &str = "2025.01.15";

const WORKFLOW_SCHEMA: &str = include_str!("../../../schema/workflow.schema.json");

static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

fn compiled() -> Result<&'static Validator, AppError> {
    let compiled = VALIDATOR.get_or_init(|| {
        let schema: Value = serde_json::from_str(WORKFLOW_SCHEMA)
            .map_err(|err| format!("embedded schema is not valid JSON: {}", err))?;
        jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&schema)
            .map_err(|err| err.to_string())
    });
    compiled.as_ref().map_err(|message| {
        AppError::new(
            ErrorCategory::SchemaError,
            format!("workflow schema failed to compile: {}", message),
        )
    })
}

/// Compile the embedded schema now. Later calls are free.
pub fn ensure_compiled() -> Result<(), AppError> {
    compiled().map(|_| ())
}

/// Validate a raw definition against the embedded schema.
///
/// One `WF_SCHEMA_INVALID` error per leaf violation, each with the instance
/// pointer and, when the pointer lands inside a top-level node, that node's
/// id and type. `Err` is returned only when the schema cannot be compiled.
pub fn validate_schema(definition: &Value) -> Result<Vec<Diagnostic>, AppError> {
    let validator = compiled()?;
    let mut diagnostics = Vec::new();
    for err in validator.iter_errors(definition) {
        let pointer = err.instance_path().to_string();
        let scope = enclosing_node(definition, &pointer);
        let mut diagnostic = Diagnostic::error("WF_SCHEMA_INVALID", err.to_string())
            .with_node(scope.id(), scope.node_type())
            .with_pointer(pointer.clone());
        if pointer.is_empty() {
            diagnostic = diagnostic.with_hint("the document root must be an object with a `nodes` array");
        }
        diagnostics.push(diagnostic);
    }
    Ok(diagnostics)
}

fn enclosing_node(definition: &Value, pointer: &str) -> NodeScope {
    let mut parts = pointer.split('/').skip(1);
    match (parts.next(), parts.next()) {
        (Some("nodes"), Some(index)) => definition
            .pointer(&format!("/nodes/{}", index))
            .map(NodeScope::of)
            .unwrap_or_default(),
        _ => NodeScope::default(),
    }
}

/// Read a JSON workflow definition from disk.
pub fn load_definition(path: &Path) -> Result<Value, AppError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::from(err)
            .with_code("WORKFLOW_READ_FAILED")
            .with_context("path", path.display().to_string())
    })?;
    parse_definition(&raw).map_err(|err| err.with_context("path", path.display().to_string()))
}

pub fn parse_definition(raw: &str) -> Result<Value, AppError> {
    serde_json::from_str(raw).map_err(|err| {
        AppError::with_source(
            ErrorCategory::SerializationError,
            format!("workflow is not valid JSON: {}", err),
            err,
        )
        .with_code("WORKFLOW_PARSE_FAILED")
    })
}
