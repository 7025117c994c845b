use playcheck::core::config::loader::CONFIG_FILE;
use playcheck::core::workflow_graph::selectors::discover_manifest;
use playcheck::core::workflow_graph::{Pipeline, ValidateOptions};
use playcheck::core::{ConfigLoader, ErrorCategory, PlaycheckConfig};
use serde_json::json;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_playcheck_env() {
    for v in &[
        "PLAYCHECK_BASE_URL",
        "PLAYCHECK_SELECTOR_MANIFEST",
        "PLAYCHECK_FIXTURES_DIR",
        "PLAYCHECK_SEED_STATE",
        "PLAYCHECK_STRICT",
    ] {
        env::remove_var(v);
    }
}

/// Test integration of config loading with environment variables
#[test]
#[serial]
fn test_config_loading_integration() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let config_content = r#"
[scenario]
base_url = "http://localhost:3000"

[paths]
playbooks = "e2e/playbooks"
fixtures = "e2e/shared"
seed_state = "e2e/seed.json"

[validation]
strict = true

[scenarios]
billing = "http://localhost:4100"
admin = "https://admin.example.test"
"#;
    fs::write(root.join(CONFIG_FILE), config_content).unwrap();

    let config = ConfigLoader::load_from_workspace(root).unwrap();
    assert_eq!(config.scenario.base_url, "http://localhost:3000");
    assert!(config.validation.strict);
    assert_eq!(config.scenarios.len(), 2);

    let context = config.scenario_context(root);
    assert_eq!(context.root, root);
    assert_eq!(context.base_url, "http://localhost:3000");
    assert_eq!(context.playbooks_dir, root.join("e2e/playbooks"));
    assert_eq!(context.fixtures_dir, root.join("e2e/shared"));
    assert_eq!(context.seed_path, root.join("e2e/seed.json"));
    assert!(context.manifest_path.is_none());
}

#[test]
#[serial]
fn test_env_overrides_take_precedence() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(
        root.join(CONFIG_FILE),
        r#"
[scenario]
base_url = "http://localhost:3000"

[paths]
fixtures = "from-file"
"#,
    )
    .unwrap();

    env::set_var("PLAYCHECK_BASE_URL", "http://localhost:5173");
    env::set_var("PLAYCHECK_FIXTURES_DIR", "/opt/fixtures");
    env::set_var("PLAYCHECK_SELECTOR_MANIFEST", "manifests/selectors.json");
    env::set_var("PLAYCHECK_SEED_STATE", "seeds/state.json");

    let config = ConfigLoader::load_from_workspace(root).unwrap();
    let context = config.scenario_context(root);
    assert_eq!(context.base_url, "http://localhost:5173");
    assert_eq!(context.fixtures_dir, PathBuf::from("/opt/fixtures"));
    assert_eq!(
        context.manifest_path,
        Some(root.join("manifests/selectors.json"))
    );
    assert_eq!(context.seed_path, root.join("seeds/state.json"));

    clear_playcheck_env();
}

#[test]
#[serial]
fn test_blank_env_values_are_ignored() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(CONFIG_FILE),
        "[scenario]\nbase_url = \"http://localhost:3000\"\n",
    )
    .unwrap();
    env::set_var("PLAYCHECK_BASE_URL", "   ");

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.scenario.base_url, "http://localhost:3000");

    clear_playcheck_env();
}

#[test]
#[serial]
fn test_invalid_toml_is_a_config_error() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(CONFIG_FILE), "[scenario\nbase_url = 3").unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
    assert!(err.context.contains_key("path"));
}

#[test]
#[serial]
fn test_scenario_urls_are_validated() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(CONFIG_FILE),
        "[scenarios]\nbilling = \"ftp://files.example.test\"\n",
    )
    .unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
    assert!(err.to_string().contains("scenarios.billing"));
}

#[test]
fn test_validate_config_rejects_empty_paths() {
    let mut config = PlaycheckConfig::default();
    config.paths.playbooks = PathBuf::new();
    let err = ConfigLoader::validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("paths.playbooks"));

    let mut config = PlaycheckConfig::default();
    config.scenarios.insert(" ".to_string(), "http://localhost:1".to_string());
    assert!(ConfigLoader::validate_config(&config).is_err());
}

#[test]
fn test_absolute_paths_are_kept() {
    let mut config = PlaycheckConfig::default();
    config.paths.selector_manifest = Some(PathBuf::from("/etc/playcheck/selectors.json"));
    let context = config.scenario_context(std::path::Path::new("/srv/app"));
    assert_eq!(
        context.manifest_path,
        Some(PathBuf::from("/etc/playcheck/selectors.json"))
    );
    assert_eq!(context.playbooks_dir, PathBuf::from("/srv/app/test/playbooks"));
}

#[test]
#[serial]
fn test_manifest_override_is_relative_to_scenario_root() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let write = |relative: &str, selector: &str| {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            json!({"selectors": {"login.submit": {"selector": selector}}}).to_string(),
        )
        .unwrap();
    };
    write("ui/src/consts/selectors.manifest.json", "#discovered");
    write("qa/selectors.json", "#override");

    env::set_var("PLAYCHECK_SELECTOR_MANIFEST", "qa/selectors.json");
    let config = ConfigLoader::load_from_workspace(root).unwrap();
    let pipeline = Pipeline::new(config.scenario_context(root));
    let resolved = pipeline
        .resolve(
            json!({"nodes": [{"id": "go", "type": "click", "data": {"label": "Go", "selector": "@selector/login.submit"}}]}),
            false,
        )
        .unwrap();
    assert_eq!(resolved.definition["nodes"][0]["data"]["selector"], "#override");

    // Discovery itself never consults the environment.
    let location = discover_manifest(root);
    let discovered = location.path.as_deref().unwrap();
    assert!(discovered.ends_with("ui/src/consts/selectors.manifest.json"));
    assert!(location.source.starts_with("discovered:"));

    clear_playcheck_env();
}

#[test]
#[serial]
fn test_missing_override_manifest_is_a_warning() {
    clear_playcheck_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("PLAYCHECK_SELECTOR_MANIFEST", "qa/missing.json");

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    let result = Pipeline::new(config.scenario_context(temp_dir.path()))
        .validate(
            &json!({"nodes": [{"id": "go", "type": "navigate", "data": {"label": "Go", "url": "http://x"}}]}),
            ValidateOptions::default(),
        )
        .unwrap();
    assert!(result.valid);
    assert!(result.has_code("WF_SELECTOR_MANIFEST_INVALID"));

    clear_playcheck_env();
}
