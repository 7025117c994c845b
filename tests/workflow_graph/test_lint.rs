use insta::assert_snapshot;
use playcheck::core::workflow_graph::lint::{lint_definition, LintOptions, LintRegistry, STRICT_ALLOWLIST};
use playcheck::core::workflow_graph::{Pipeline, ScenarioContext, ValidateOptions, ValidationResult};
use serde_json::{json, Value};
use tempfile::TempDir;

fn validate(definition: &Value, strict: bool) -> ValidationResult {
    let root = TempDir::new().expect("temp dir");
    Pipeline::new(ScenarioContext::new(root.path()))
        .validate(
            definition,
            ValidateOptions {
                strict,
                resolve: false,
            },
        )
        .expect("validate")
}

fn codes(result: &ValidationResult) -> String {
    result
        .diagnostics()
        .map(|diagnostic| diagnostic.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn two_unlabelled_waits() -> Value {
    json!({
        "nodes": [
            {"id": "w1", "type": "wait", "data": {"waitType": "duration", "durationMs": 500}},
            {"id": "w2", "type": "wait", "data": {"waitType": "duration", "durationMs": 500}}
        ],
        "edges": []
    })
}

#[test]
fn navigate_then_wait_is_valid() {
    let definition = json!({
        "nodes": [
            {"id": "open", "type": "navigate", "data": {"label": "Open app", "destinationType": "url", "url": "http://localhost:3000"}},
            {"id": "pause", "type": "wait", "data": {"label": "Settle", "waitType": "duration", "durationMs": 500}}
        ],
        "edges": [{"id": "e1", "source": "open", "target": "pause"}]
    });

    let result = validate(&definition, false);
    assert!(result.valid, "unexpected diagnostics: {}", codes(&result));
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(result.stats.node_count, 2);
    assert_eq!(result.stats.edge_count, 1);
    assert_eq!(result.schema_version, "2025.01.15");
}

#[test]
fn screenshot_needs_full_page_or_selector() {
    let definition = json!({
        "nodes": [{"id": "shot", "type": "screenshot", "data": {"label": "Capture", "fullPage": false}}]
    });

    let result = validate(&definition, false);
    assert!(!result.valid);
    let error = &result.errors[0];
    assert_eq!(error.code, "WF_SCREENSHOT_TARGET_REQUIRED");
    assert_eq!(error.node_id.as_deref(), Some("shot"));
    assert_eq!(error.pointer.as_deref(), Some("/nodes/0/data/selector"));

    let full_page = json!({
        "nodes": [{"id": "shot", "type": "screenshot", "data": {"label": "Capture", "fullPage": true}}]
    });
    assert!(validate(&full_page, false).valid);
}

#[test]
fn evaluate_requires_one_of_its_code_fields() {
    let definition = json!({"nodes": [{"id": "calc", "type": "evaluate", "data": {}}]});

    let result = validate(&definition, false);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, "WF_NODE_FIELD_ONE_OF");
    assert_eq!(result.errors[0].field.as_deref(), Some("expression|script|code"));
    assert!(result.has_code("WF_NODE_LABEL_MISSING"));
}

#[test]
fn strict_mode_promotes_allowlisted_warnings() {
    let definition = two_unlabelled_waits();

    let relaxed = validate(&definition, false);
    assert!(relaxed.valid);
    assert_snapshot!(
        codes(&relaxed),
        @"WF_EDGES_EMPTY, WF_EDGE_SPARSITY, WF_NODE_LABEL_MISSING, WF_NODE_LABEL_MISSING"
    );

    let strict = validate(&definition, true);
    assert!(!strict.valid);
    assert_snapshot!(
        codes(&strict),
        @"WF_STRICT_WARNING, WF_EDGES_EMPTY, WF_EDGE_SPARSITY, WF_NODE_LABEL_MISSING, WF_NODE_LABEL_MISSING"
    );
    assert_eq!(strict.errors[0].hint.as_deref(), Some("promoted from WF_EDGES_EMPTY"));
    assert_eq!(strict.errors[0].pointer.as_deref(), Some("/edges"));
}

#[test]
fn strict_errors_are_a_superset_of_relaxed_errors() {
    let definitions = [
        two_unlabelled_waits(),
        json!({
            "nodes": [
                {"id": "a", "type": "wait", "data": {"waitType": "forever"}},
                {"id": "b", "type": "navigate", "data": {"destinationType": "teleport"}},
                {"id": "c", "type": "loop", "data": {"loopType": "sometimes", "maxIterations": 5000}},
                {"id": "a", "type": "click", "data": {}}
            ],
            "edges": [{"id": "e1", "source": "a", "target": "ghost"}, {"id": "e2", "source": "b", "target": "b"}]
        }),
    ];

    for definition in definitions {
        let relaxed = validate(&definition, false);
        let strict = validate(&definition, true);

        for error in &relaxed.errors {
            assert!(strict.errors.contains(error), "strict mode dropped {}", error);
        }
        let extra: Vec<_> = strict
            .errors
            .iter()
            .filter(|error| !relaxed.errors.contains(error))
            .collect();
        for error in &extra {
            assert_eq!(error.code, "WF_STRICT_WARNING");
            let origin = relaxed
                .warnings
                .iter()
                .find(|warning| {
                    warning.message == error.message
                        && warning.node_id == error.node_id
                        && warning.pointer == error.pointer
                })
                .expect("promoted error has an originating warning");
            assert!(STRICT_ALLOWLIST.contains(&origin.code.as_str()));
        }
        assert_eq!(relaxed.warnings, strict.warnings);
    }
}

#[test]
fn diagnostics_are_stably_ordered() {
    let definition = json!({
        "nodes": [
            {"id": "z", "type": "click", "data": {"label": "Z"}},
            {"id": "a", "type": "hover", "data": {}},
            {"id": "a", "type": "teleport"},
            {"type": "wait", "data": {"waitType": "element"}}
        ],
        "edges": [
            {"id": "e1", "source": "z", "target": "nowhere"},
            {"id": "e2", "source": "", "target": "a"}
        ]
    });

    let first = validate(&definition, true);
    let second = validate(&definition, true);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.warnings, second.warnings);

    for pair in first.errors.windows(2) {
        assert!(pair[0].code <= pair[1].code);
    }
    assert!(first.errors.iter().all(|d| d.is_error()));
    assert!(first.warnings.iter().all(|d| !d.is_error()));
    assert_snapshot!(
        first.errors.iter().map(|d| d.code.as_str()).collect::<Vec<_>>().join(", "),
        @"WF_EDGE_ENDPOINT_MISSING, WF_EDGE_TARGET_UNKNOWN, WF_NODE_FIELD_REQUIRED, WF_NODE_FIELD_REQUIRED, WF_NODE_ID_DUPLICATE, WF_NODE_ID_MISSING, WF_NODE_TYPE_UNKNOWN, WF_WAIT_SELECTOR_REQUIRED"
    );
}

#[test]
fn nested_inline_definitions_are_linted_with_prefixed_pointers() {
    let definition = json!({
        "nodes": [{
            "id": "outer",
            "type": "subflow",
            "data": {
                "label": "Inline",
                "workflowDefinition": {
                    "nodes": [{"id": "inner", "type": "click", "data": {"label": "Press"}}],
                    "edges": []
                }
            }
        }]
    });

    let report = lint_definition(&definition, LintOptions::default(), None);
    let nested = report
        .diagnostics
        .iter()
        .find(|d| d.code == "WF_NODE_FIELD_REQUIRED")
        .expect("nested click without selector");
    assert_eq!(nested.node_id.as_deref(), Some("inner"));
    assert_eq!(
        nested.pointer.as_deref(),
        Some("/nodes/0/data/workflowDefinition/nodes/0/data/selector")
    );
    assert_eq!(report.stats.node_count, 1);
}

#[test]
fn registry_lists_built_in_rules() {
    let names = LintRegistry::new().rule_names();
    assert_eq!(
        names,
        vec!["graph-structure", "edge-sparsity", "selector-duplicates", "viewport", "unknown-selector"]
    );
}

#[test]
fn stats_count_selectors_across_the_tree() {
    let definition = json!({
        "nodes": [
            {"id": "a", "type": "click", "data": {"label": "A", "selector": "#save"}},
            {"id": "b", "type": "wait", "data": {"label": "B", "waitType": "element", "selector": "#save"}},
            {"id": "c", "type": "dragDrop", "data": {"label": "C", "sourceSelector": "#from", "targetSelector": "#to"}}
        ],
        "edges": [
            {"id": "e1", "source": "a", "target": "b"},
            {"id": "e2", "source": "b", "target": "c"}
        ],
        "settings": {"executionViewport": {"width": 120, "height": 800}},
        "metadata": {"name": "stats"}
    });

    let result = validate(&definition, false);
    assert_eq!(result.stats.selector_count, 4);
    assert_eq!(result.stats.unique_selector_count, 3);
    assert_eq!(result.stats.element_wait_count, 1);
    assert!(result.stats.has_metadata);
    assert!(result.stats.has_execution_viewport);
    assert!(result.has_code("WF_SELECTOR_DUPLICATES"));
    assert!(result.has_code("WF_VIEWPORT_SMALL"));
}

fn single_node(node_type: &str, data: Value) -> Value {
    json!({"nodes": [{"id": "n", "type": node_type, "data": data}], "edges": []})
}

fn located_codes(definition: &Value) -> Vec<(String, Option<String>)> {
    lint_definition(definition, LintOptions::default(), None)
        .diagnostics
        .into_iter()
        .filter(|d| d.code != "WF_NODE_LABEL_MISSING")
        .map(|d| (d.code, d.pointer))
        .collect()
}

#[test]
fn custom_validators_report_their_codes() {
    let cases = [
        (
            single_node("type", json!({"selector": "#email"})),
            "WF_TYPE_INPUT_REQUIRED",
            "/nodes/0/data/value",
        ),
        (
            single_node("navigate", json!({"destinationType": "url"})),
            "WF_NAVIGATE_URL_REQUIRED",
            "/nodes/0/data/url",
        ),
        (
            single_node("navigate", json!({"destinationType": "scenario", "scenarioPath": "/"})),
            "WF_NAVIGATE_SCENARIO_REQUIRED",
            "/nodes/0/data/scenario",
        ),
        (
            single_node("loop", json!({"loopType": "forEach"})),
            "WF_LOOP_ARRAY_SOURCE_REQUIRED",
            "/nodes/0/data/arraySource",
        ),
        (
            single_node("loop", json!({"loopType": "while"})),
            "WF_LOOP_CONDITION_REQUIRED",
            "/nodes/0/data/condition",
        ),
        (
            single_node("loop", json!({"loopType": "until"})),
            "WF_LOOP_TYPE_UNKNOWN",
            "/nodes/0/data/loopType",
        ),
    ];

    for (definition, code, pointer) in cases {
        assert_eq!(
            located_codes(&definition),
            vec![(code.to_string(), Some(pointer.to_string()))],
            "{}",
            code
        );
    }
}

#[test]
fn satisfied_custom_validators_are_quiet() {
    let cases = [
        single_node("type", json!({"selector": "#email", "variable": "user.email"})),
        single_node("navigate", json!({"url": "http://localhost:3000"})),
        single_node("loop", json!({"loopType": "FOREACH", "arraySource": "rows"})),
        single_node("loop", json!({"loopType": "while", "condition": "more"})),
    ];
    for definition in cases {
        assert!(located_codes(&definition).is_empty(), "{}", definition);
    }
}

#[test]
fn unknown_loop_type_is_a_warning() {
    let report = lint_definition(
        &single_node("loop", json!({"label": "Spin", "loopType": "until"})),
        LintOptions::default(),
        None,
    );
    assert_eq!(report.diagnostics.len(), 1);
    assert!(!report.diagnostics[0].is_error());
}

#[test]
fn structural_node_problems() {
    let definition = json!({
        "nodes": [
            {"id": "untyped", "data": {"label": "Untyped"}},
            {"id": "flat", "type": "click", "data": "click #save"}
        ],
        "edges": [{"id": "e1", "source": "ghost", "target": "flat"}]
    });

    let report = lint_definition(&definition, LintOptions::default(), None);
    let find = |code: &str| {
        report
            .diagnostics
            .iter()
            .find(|d| d.code == code)
            .unwrap_or_else(|| panic!("missing {}", code))
    };

    let missing_type = find("WF_NODE_TYPE_MISSING");
    assert_eq!(missing_type.node_id.as_deref(), Some("untyped"));
    assert_eq!(missing_type.pointer.as_deref(), Some("/nodes/0/type"));

    let bad_data = find("WF_NODE_DATA_INVALID");
    assert_eq!(bad_data.node_id.as_deref(), Some("flat"));
    assert_eq!(bad_data.pointer.as_deref(), Some("/nodes/1/data"));

    let unknown_source = find("WF_EDGE_SOURCE_UNKNOWN");
    assert!(unknown_source.message.contains("ghost"));
    assert_eq!(unknown_source.pointer.as_deref(), Some("/edges/0/source"));
    assert!(!report.diagnostics.iter().any(|d| d.code == "WF_EDGE_TARGET_UNKNOWN"));
}
