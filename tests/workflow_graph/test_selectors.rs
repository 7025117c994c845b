use playcheck::core::workflow_graph::selectors::{
    load_manifest, resolve_selectors, strip_dup_suffixes, ManifestLoad, SelectorManifest,
};
use playcheck::core::workflow_graph::{Pipeline, ScenarioContext, ValidateOptions};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
    "selectors": {
        "nav.home": {"selector": "[data-testid=\"nav-home\"]"},
        "form.submit": "[data-testid=\"form-submit\"] /*dup-1*/"
    },
    "dynamicSelectors": {
        "button.row": {
            "selectorPattern": "[data-row=\"${index}\"]",
            "params": [{"name": "index", "type": "number", "required": true}]
        },
        "tab.by-state": {
            "selectorPattern": "[data-tab=\"${name}\"][data-state=\"${state}\"]",
            "params": [
                {"name": "name", "type": "string", "required": true},
                {"name": "state", "type": "enum", "values": ["open", "closed"], "default": "open"}
            ]
        }
    }
}"#;

fn manifest() -> SelectorManifest {
    SelectorManifest::from_json(MANIFEST, None).expect("manifest parses")
}

fn click(selector: &str) -> Value {
    json!({
        "nodes": [{"id": "press", "type": "click", "data": {"label": "Press", "selector": selector}}],
        "edges": []
    })
}

#[test]
fn dynamic_selector_binds_numeric_parameter() {
    let mut definition = click("@selector/button.row(index=3)");
    let diagnostics = resolve_selectors(&mut definition, Some(&manifest()));
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(definition["nodes"][0]["data"]["selector"], "[data-row=\"3\"]");
}

#[test]
fn non_numeric_index_is_rejected() {
    let mut definition = click("@selector/button.row(index=third)");
    let diagnostics = resolve_selectors(&mut definition, Some(&manifest()));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "WF_SELECTOR_PARAM_INVALID");
    assert_eq!(diagnostics[0].node_id.as_deref(), Some("press"));
    assert_eq!(diagnostics[0].field.as_deref(), Some("selector"));
    assert_eq!(
        definition["nodes"][0]["data"]["selector"],
        "@selector/button.row(index=third)"
    );
}

#[test]
fn missing_required_parameter_is_rejected() {
    let mut definition = click("@selector/button.row");
    let diagnostics = resolve_selectors(&mut definition, Some(&manifest()));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "WF_SELECTOR_PARAM_MISSING");
}

#[test]
fn enum_defaults_and_unknown_parameters() {
    let mut definition = click("@selector/tab.by-state(name=\"billing\")");
    assert!(resolve_selectors(&mut definition, Some(&manifest())).is_empty());
    assert_eq!(
        definition["nodes"][0]["data"]["selector"],
        "[data-tab=\"billing\"][data-state=\"open\"]"
    );

    let mut definition = click("@selector/tab.by-state(name=billing, state=ajar, color=red)");
    let codes: Vec<_> = resolve_selectors(&mut definition, Some(&manifest()))
        .into_iter()
        .map(|d| d.code)
        .collect();
    assert!(codes.contains(&"WF_SELECTOR_PARAM_UNKNOWN".to_string()));
    assert!(codes.contains(&"WF_SELECTOR_PARAM_INVALID".to_string()));
}

#[test]
fn unknown_ids_suggest_close_matches() {
    let mut definition = click("@selector/nav.hom");
    let diagnostics = resolve_selectors(&mut definition, Some(&manifest()));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "WF_SELECTOR_UNRESOLVED");
    let hint = diagnostics[0].hint.as_deref().unwrap_or_default();
    assert!(hint.contains("nav.home"), "hint was {}", hint);
}

#[test]
fn tokens_embedded_in_text_resolve_in_place() {
    let mut definition = json!({
        "nodes": [{
            "id": "check",
            "type": "assert",
            "data": {"label": "Check", "selector": "@selector/nav.home >> @selector/form.submit", "assertMode": "exists"}
        }]
    });
    assert!(resolve_selectors(&mut definition, Some(&manifest())).is_empty());
    assert_eq!(
        definition["nodes"][0]["data"]["selector"],
        "[data-testid=\"nav-home\"] >> [data-testid=\"form-submit\"]"
    );
}

#[test]
fn without_a_manifest_every_token_is_unresolved() {
    let mut definition = click("@selector/nav.home");
    let diagnostics = resolve_selectors(&mut definition, None);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "WF_SELECTOR_UNRESOLVED");
}

#[test]
fn dup_suffixes_are_stripped() {
    assert_eq!(strip_dup_suffixes("#save /*dup-12*/"), "#save");
    assert_eq!(strip_dup_suffixes("#save"), "#save");
}

#[test]
fn pipeline_uses_the_configured_manifest() {
    let root = TempDir::new().expect("temp dir");
    let manifest_path = root.path().join("selectors.manifest.json");
    fs::write(&manifest_path, MANIFEST).expect("write manifest");
    let pipeline =
        Pipeline::new(ScenarioContext::new(root.path()).with_manifest_path(&manifest_path));

    let resolved = pipeline
        .resolve(click("@selector/button.row(index=7)"), false)
        .expect("resolve");
    assert!(resolved.result.valid, "{:?}", resolved.result.errors);
    assert_eq!(
        resolved.definition["nodes"][0]["data"]["selector"],
        "[data-row=\"7\"]"
    );

    let result = pipeline
        .validate(&click("@selector/nav.away"), ValidateOptions::default())
        .expect("validate");
    assert!(result.valid);
    assert!(result.has_code("WF_SELECTOR_UNKNOWN"));
}

#[test]
fn broken_manifest_degrades_to_a_warning() {
    let root = TempDir::new().expect("temp dir");
    let manifest_path = root.path().join("selectors.manifest.json");
    fs::write(&manifest_path, "{ not json").expect("write manifest");
    assert!(matches!(load_manifest(&manifest_path), ManifestLoad::Failed { .. }));

    let pipeline =
        Pipeline::new(ScenarioContext::new(root.path()).with_manifest_path(&manifest_path));
    let result = pipeline
        .validate(
            &click("#plain"),
            ValidateOptions {
                strict: false,
                resolve: true,
            },
        )
        .expect("validate");
    assert!(result.valid);
    assert!(result.has_code("WF_SELECTOR_MANIFEST_INVALID"));
}

#[test]
fn malformed_selector_references_are_syntax_errors() {
    for raw in ["@selector/button.row(index=3", "@selector/", "@selector/(index=3)"] {
        let mut definition = click(raw);
        let diagnostics = resolve_selectors(&mut definition, Some(&manifest()));
        assert_eq!(diagnostics.len(), 1, "{}", raw);
        assert_eq!(diagnostics[0].code, "WF_SELECTOR_INVALID_SYNTAX", "{}", raw);
        assert_eq!(diagnostics[0].node_id.as_deref(), Some("press"));
        assert_eq!(definition["nodes"][0]["data"]["selector"], raw);
    }
}
