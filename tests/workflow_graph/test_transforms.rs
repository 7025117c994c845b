use anyhow::anyhow;
use playcheck::core::workflow_graph::transform::{
    apply_rewrites, extract_port, join_url, rewrite_scenarios, substitute_placeholders,
    ScenarioResolver,
};
use serde_json::json;

fn local_app(name: &str) -> anyhow::Result<String> {
    match name {
        "my-app" => Ok("http://localhost:3000".to_string()),
        "billing" => Ok("http://localhost:4100/".to_string()),
        other => Err(anyhow!("no scenario named {}", other)),
    }
}

#[test]
fn scenario_navigation_becomes_url_navigation() {
    let mut definition = json!({
        "nodes": [
            {"id": "dash", "type": "navigate", "data": {
                "label": "Dashboard",
                "destinationType": "scenario",
                "scenario": "my-app",
                "scenarioPath": "/dashboard"
            }},
            {"id": "plain", "type": "navigate", "data": {
                "label": "Plain",
                "destinationType": "url",
                "url": "http://example.com"
            }}
        ],
        "edges": [{"id": "e1", "source": "dash", "target": "plain"}]
    });
    let untouched = definition["nodes"][1].clone();

    let diagnostics = rewrite_scenarios(&mut definition, &local_app);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(
        definition["nodes"][0]["data"],
        json!({
            "label": "Dashboard",
            "destinationType": "url",
            "url": "http://localhost:3000/dashboard"
        })
    );
    assert_eq!(definition["nodes"][1], untouched);
}

#[test]
fn scenario_failures_carry_the_node() {
    let mut definition = json!({
        "nodes": [
            {"id": "nameless", "type": "navigate", "data": {"destinationType": "Scenario", "scenario": " "}},
            {"id": "unknown", "type": "navigate", "data": {"destinationType": "scenario", "scenario": "ghost"}}
        ]
    });

    let diagnostics = rewrite_scenarios(&mut definition, &local_app);
    let codes: Vec<_> = diagnostics
        .iter()
        .map(|d| (d.code.as_str(), d.node_id.as_deref()))
        .collect();
    assert_eq!(
        codes,
        vec![
            ("WF_SCENARIO_NAME_MISSING", Some("nameless")),
            ("WF_SCENARIO_RESOLVE_FAILED", Some("unknown")),
        ]
    );
    assert_eq!(definition["nodes"][1]["data"]["scenario"], "ghost");
}

#[test]
fn nested_definitions_are_rewritten() {
    let mut definition = json!({
        "nodes": [{"id": "outer", "type": "subflow", "data": {"workflowDefinition": {
            "nodes": [{"id": "inner", "type": "navigate", "data": {"destinationType": "scenario", "scenario": "billing"}}],
            "edges": []
        }}}]
    });

    assert!(rewrite_scenarios(&mut definition, &local_app).is_empty());
    let inner = &definition["nodes"][0]["data"]["workflowDefinition"]["nodes"][0]["data"];
    assert_eq!(inner["url"], "http://localhost:4100/");
    assert!(inner.get("scenario").is_none());
}

#[test]
fn urls_join_with_exactly_one_slash() {
    assert_eq!(join_url("http://h:1", "/a"), "http://h:1/a");
    assert_eq!(join_url("http://h:1/", "a"), "http://h:1/a");
    assert_eq!(join_url("http://h:1//", "//a"), "http://h:1/a");
    assert_eq!(join_url("http://h:1", ""), "http://h:1");
}

#[test]
fn placeholders_use_the_base_url_and_its_port() {
    let mut definition = json!({
        "nodes": [{"id": "n", "type": "navigate", "data": {
            "url": "${BASE_URL}/login",
            "note": "served on {{UI_PORT}}"
        }}]
    });
    substitute_placeholders(&mut definition, "http://localhost:5173");
    assert_eq!(definition["nodes"][0]["data"]["url"], "http://localhost:5173/login");
    assert_eq!(definition["nodes"][0]["data"]["note"], "served on 5173");

    assert_eq!(extract_port("http://localhost:3000/app"), Some("3000".to_string()));
    assert_eq!(extract_port("https://example.com"), None);
}

#[test]
fn empty_base_url_only_clears_base_url() {
    let mut definition = json!({"nodes": [{"data": {"url": "${BASE_URL}/x", "port": "{{UI_PORT}}"}}]});
    substitute_placeholders(&mut definition, "");
    assert_eq!(definition["nodes"][0]["data"]["url"], "/x");
    assert_eq!(definition["nodes"][0]["data"]["port"], "{{UI_PORT}}");
}

#[test]
fn rewrites_run_scenarios_before_placeholders() {
    let resolver = |name: &str| -> anyhow::Result<String> {
        assert_eq!(name, "my-app");
        Ok("${BASE_URL}".to_string())
    };
    let mut definition = json!({
        "nodes": [{"id": "go", "type": "navigate", "data": {
            "destinationType": "scenario", "scenario": "my-app", "scenarioPath": "/home"
        }}]
    });

    let diagnostics = apply_rewrites(&mut definition, "http://localhost:3000", Some(&resolver as &dyn ScenarioResolver));
    assert!(diagnostics.is_empty());
    assert_eq!(definition["nodes"][0]["data"]["url"], "http://localhost:3000/home");
}

#[test]
fn missing_resolver_leaves_scenarios_alone() {
    let mut definition = json!({
        "nodes": [{"id": "go", "type": "navigate", "data": {"destinationType": "scenario", "scenario": "my-app"}}]
    });
    let before = definition.clone();
    assert!(apply_rewrites(&mut definition, "", None).is_empty());
    assert_eq!(definition, before);
}
