use playcheck::core::workflow_graph::schema::{load_definition, parse_definition, validate_schema};
use playcheck::core::workflow_graph::{Pipeline, ScenarioContext, ValidateOptions};
use playcheck::core::ErrorCategory;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[test]
fn wrong_field_type_points_at_the_field() {
    let definition = json!({
        "nodes": [
            {"id": "open", "type": "navigate", "data": {"url": "http://localhost:3000"}},
            {"id": "shot", "type": 7}
        ],
        "edges": [{"id": "e1", "source": "open", "target": "shot"}]
    });

    let diagnostics = validate_schema(&definition).expect("schema compiles");
    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.code, "WF_SCHEMA_INVALID");
    assert_eq!(diagnostic.pointer.as_deref(), Some("/nodes/1/type"));
    assert_eq!(diagnostic.node_id.as_deref(), Some("shot"));
    assert!(diagnostic.is_error());
}

#[test]
fn missing_nodes_is_reported_at_the_root() {
    let diagnostics = validate_schema(&json!({"edges": []})).expect("schema compiles");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].pointer.as_deref(), Some(""));
    assert!(diagnostics[0].hint.is_some());
}

#[test]
fn schema_checks_types_not_presence() {
    let definition = json!({"nodes": [{"data": {}}]});
    assert!(validate_schema(&definition).expect("schema compiles").is_empty());
}

#[test]
fn schema_errors_skip_resolution() {
    let root = TempDir::new().expect("temp dir");
    let pipeline = Pipeline::new(ScenarioContext::new(root.path()));
    let options = ValidateOptions {
        strict: false,
        resolve: true,
    };

    let broken = json!({
        "nodes": [
            {"id": "login", "type": "subflow", "data": {"label": "Login", "workflowId": "@fixture/login-flow"}},
            {"id": "bad", "type": "wait", "data": "soon"}
        ]
    });
    let result = pipeline.validate(&broken, options).expect("validate");
    assert!(result.has_code("WF_SCHEMA_INVALID"));
    assert!(!result.has_code("WF_FIXTURE_NOT_FOUND"));

    let schema_clean = json!({
        "nodes": [
            {"id": "login", "type": "subflow", "data": {"label": "Login", "workflowId": "@fixture/login-flow"}}
        ]
    });
    let result = pipeline.validate(&schema_clean, options).expect("validate");
    assert!(!result.has_code("WF_SCHEMA_INVALID"));
    assert!(result.has_code("WF_FIXTURE_NOT_FOUND"));
}

#[test]
fn unreadable_and_malformed_files_are_fatal_errors() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("missing.json");
    let err = load_definition(&missing).expect_err("missing file");
    assert_eq!(err.code, "WORKFLOW_READ_FAILED");

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{\"nodes\": [").expect("write");
    let err = load_definition(&broken).expect_err("invalid json");
    assert_eq!(err.category, ErrorCategory::SerializationError);
    assert_eq!(err.code, "WORKFLOW_PARSE_FAILED");
    assert!(err.context.contains_key("path"));

    assert!(parse_definition("{\"nodes\": []}").is_ok());
}
