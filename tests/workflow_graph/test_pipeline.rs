use playcheck::core::workflow_graph::clean::clean_definition;
use playcheck::core::workflow_graph::{Pipeline, ScenarioContext, ValidateOptions};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    fs::write(path, serde_json::to_string_pretty(value).expect("serialize")).expect("write");
}

/// A scenario root with a selector manifest, two fixtures and a seed state.
fn scenario_root() -> TempDir {
    let root = TempDir::new().expect("temp dir");
    let context = ScenarioContext::new(root.path());

    write_json(
        &root.path().join("ui/src/consts/selectors.manifest.json"),
        &json!({
            "selectors": {"login.submit": {"selector": "[data-testid=\"login-submit\"]"}},
            "dynamicSelectors": {}
        }),
    );
    write_json(
        &context.fixtures_dir.join("auth/login-flow.json"),
        &json!({
            "metadata": {
                "fixture_id": "login-flow",
                "parameters": [{"name": "user", "type": "string", "required": true}],
                "requirements": ["seed-user"],
                "reset": "full"
            },
            "nodes": [
                {"id": "home", "type": "subflow", "data": {"label": "Home", "workflowId": "@fixture/navigate-to(path=/login)"}},
                {"id": "submit", "type": "click", "data": {"label": "Submit as ${fixture.user}", "selector": "@selector/login.submit"}}
            ],
            "edges": [{"id": "e1", "source": "home", "target": "submit"}]
        }),
    );
    write_json(
        &context.fixtures_dir.join("navigate-to.json"),
        &json!({
            "metadata": {
                "fixture_id": "navigate-to",
                "parameters": [{"name": "path", "type": "string", "default": "/"}]
            },
            "nodes": [{"id": "go", "type": "navigate", "data": {"label": "Go", "url": "${BASE_URL}${fixture.path}"}}],
            "edges": []
        }),
    );
    write_json(&context.seed_path, &json!({"user": {"email": "qa@example.com"}}));
    root
}

fn checkout() -> Value {
    json!({
        "flow_definition": {
            "nodes": [
                {"id": "login", "type": "subflow", "data": {"label": "Login", "workflowId": "@fixture/login-flow(user=qa)"}},
                {"id": "billing", "type": "navigate", "data": {
                    "label": "Billing", "destinationType": "scenario", "scenario": "billing", "scenarioPath": "invoices"
                }},
                {"id": "email", "type": "type", "data": {"label": "Email", "selector": "#email", "value": "@seed/user.email"}}
            ],
            "edges": [
                {"id": "e1", "source": "login", "target": "billing"},
                {"id": "e2", "source": "billing", "target": "email"}
            ],
            "settings": {"executionViewport": {"width": 1280, "height": 720}},
            "metadata": {"name": "checkout"}
        }
    })
}

fn pipeline(root: &TempDir) -> Pipeline {
    Pipeline::new(ScenarioContext::new(root.path()).with_base_url("http://localhost:3000"))
        .with_resolver(|name: &str| -> anyhow::Result<String> {
            match name {
                "billing" => Ok("http://localhost:4100".to_string()),
                other => anyhow::bail!("unknown scenario {}", other),
            }
        })
}

#[test]
fn resolves_a_playbook_end_to_end() {
    let root = scenario_root();
    let pipeline = pipeline(&root);

    let definition = checkout();
    let inner = definition["flow_definition"].clone();
    let resolved = pipeline.resolve(inner, false).expect("resolve");
    assert!(resolved.result.valid, "{:?}", resolved.result.errors);

    let out = &resolved.definition;
    let keys: Vec<_> = out.as_object().expect("object").keys().cloned().collect();
    assert_eq!(keys, vec!["nodes", "edges", "settings"]);

    let login = &out["nodes"][0]["data"]["workflowDefinition"];
    assert_eq!(
        login["nodes"][0]["data"]["workflowDefinition"]["nodes"][0]["data"]["url"],
        "http://localhost:3000/login"
    );
    assert_eq!(login["nodes"][1]["data"]["selector"], "[data-testid=\"login-submit\"]");
    assert_eq!(login["nodes"][1]["data"]["label"], "Submit as qa");

    let billing = &out["nodes"][1]["data"];
    assert_eq!(billing["destinationType"], "url");
    assert_eq!(billing["url"], "http://localhost:4100/invoices");
    assert!(billing.get("scenario").is_none());

    assert_eq!(out["nodes"][2]["data"]["value"], "@seed/user.email");

    assert_eq!(resolved.metadata.requirements_from_fixtures, vec!["seed-user".to_string()]);
    assert_eq!(resolved.metadata.reset, "full");
    assert_eq!(resolved.initial_params["user"]["email"], "qa@example.com");
}

#[test]
fn flow_definition_envelope_is_unwrapped_on_clean() {
    let root = scenario_root();
    let resolved = pipeline(&root).resolve(checkout(), false).expect("resolve");
    assert!(resolved.definition.get("flow_definition").is_none());
    assert!(resolved.definition.get("metadata").is_none());
}

#[test]
fn reset_defaults_to_none() {
    let root = TempDir::new().expect("temp dir");
    let definition = json!({
        "nodes": [{"id": "open", "type": "navigate", "data": {"label": "Open", "url": "${BASE_URL}/"}}],
        "edges": []
    });

    let resolved = Pipeline::new(ScenarioContext::new(root.path()))
        .resolve(definition, false)
        .expect("resolve");
    assert!(resolved.result.valid);
    assert_eq!(resolved.metadata.reset, "none");
    assert!(resolved.metadata.requirements_from_fixtures.is_empty());
    assert!(resolved.initial_params.is_empty());
    assert_eq!(resolved.definition["nodes"][0]["data"]["url"], "/");
}

#[test]
fn declared_reset_is_kept_when_stronger() {
    let root = TempDir::new().expect("temp dir");
    let definition = json!({
        "nodes": [{"id": "open", "type": "navigate", "data": {"label": "Open", "url": "http://x"}}],
        "metadata": {"reset": "FULL"}
    });
    let resolved = Pipeline::new(ScenarioContext::new(root.path()))
        .resolve(definition, false)
        .expect("resolve");
    assert_eq!(resolved.metadata.reset, "full");
}

#[test]
fn invalid_seed_state_is_a_warning() {
    let root = TempDir::new().expect("temp dir");
    let context = ScenarioContext::new(root.path());
    fs::create_dir_all(context.seed_path.parent().expect("parent")).expect("create dir");
    fs::write(&context.seed_path, "[1, 2, 3]").expect("write");

    let resolved = Pipeline::new(context)
        .resolve(
            json!({"nodes": [{"id": "open", "type": "navigate", "data": {"label": "Open", "url": "http://x"}}]}),
            false,
        )
        .expect("resolve");
    assert!(resolved.result.valid);
    assert!(resolved.result.has_code("WF_SEED_STATE_INVALID"));
    assert!(resolved.initial_params.is_empty());
}

#[test]
fn resolution_errors_make_the_result_invalid() {
    let root = scenario_root();
    let definition = json!({
        "nodes": [
            {"id": "login", "type": "subflow", "data": {"label": "Login", "workflowId": "@fixture/login-flow"}},
            {"id": "away", "type": "navigate", "data": {"label": "Away", "destinationType": "scenario", "scenario": "ghost"}}
        ],
        "edges": [{"id": "e1", "source": "login", "target": "away"}]
    });

    let result = pipeline(&root)
        .validate(
            &definition,
            ValidateOptions {
                strict: false,
                resolve: true,
            },
        )
        .expect("validate");
    assert!(!result.valid);
    assert!(result.has_code("WF_FIXTURE_PARAM_MISSING"));
    assert!(result.has_code("WF_SCENARIO_RESOLVE_FAILED"));

    let lint_only = pipeline(&root)
        .validate(&definition, ValidateOptions::default())
        .expect("validate");
    assert!(lint_only.valid);
}

#[test]
fn validate_does_not_mutate_its_input() {
    let root = scenario_root();
    let definition = checkout()["flow_definition"].clone();
    let before = definition.clone();
    let result = pipeline(&root)
        .validate(
            &definition,
            ValidateOptions {
                strict: true,
                resolve: true,
            },
        )
        .expect("validate");
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(definition, before);
}

#[test]
fn cleaning_is_idempotent() {
    let samples = [
        checkout(),
        checkout()["flow_definition"].clone(),
        json!({"nodes": [{"id": "s", "data": {"workflowDefinition": {"flow_definition": {"nodes": [], "extra": 1}}}}], "junk": true}),
        json!([1, 2, 3]),
        json!({}),
    ];
    for sample in samples {
        let once = clean_definition(&sample);
        assert_eq!(clean_definition(&once), once);
    }
}

#[test]
fn cancellation_stops_before_any_stage() {
    let root = TempDir::new().expect("temp dir");
    let token = CancellationToken::new();
    let pipeline = Pipeline::new(ScenarioContext::new(root.path())).with_cancellation(token.clone());
    token.cancel();

    let err = pipeline.resolve(json!({"nodes": []}), false).expect_err("cancelled");
    assert!(err.is_cancelled());
    assert_eq!(err.code, "PIPELINE_CANCELLED");

    let err = pipeline.preflight_scenario().expect_err("cancelled");
    assert_eq!(err.context.get("stage").map(String::as_str), Some("preflight"));
}

#[test]
fn one_pipeline_serves_parallel_requests() {
    let root = scenario_root();
    let pipeline = Arc::new(pipeline(&root));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                pipeline
                    .resolve(checkout()["flow_definition"].clone(), false)
                    .expect("resolve")
            })
        })
        .collect();

    let outputs: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    for output in &outputs {
        assert!(output.result.valid);
        assert_eq!(output.definition, outputs[0].definition);
    }
}
