use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod loader;

pub use loader::ConfigLoader;

use crate::core::workflow_graph::pipeline::{
    ScenarioContext, DEFAULT_FIXTURES_DIR, DEFAULT_PLAYBOOKS_DIR, DEFAULT_SEED_STATE,
};

/// Scenario configuration loaded from playcheck.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlaycheckConfig {
    /// UI settings of the scenario under test
    #[serde(default)]
    pub scenario: ScenarioConfig,

    /// Scenario-relative locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Validation defaults
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Scenario name to UI base URL, used when rewriting scenario navigation
    #[serde(default)]
    pub scenarios: BTreeMap<String, String>,

    /// Raw `[logging]` section; resolved by `crate::logging::config`
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioConfig {
    /// UI base URL substituted for `${BASE_URL}`
    #[serde(default)]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_playbooks")]
    pub playbooks: PathBuf,

    #[serde(default = "default_fixtures")]
    pub fixtures: PathBuf,

    #[serde(default = "default_seed_state")]
    pub seed_state: PathBuf,

    /// Skips manifest discovery when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationConfig {
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_file: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_output: Option<String>,
}

fn default_playbooks() -> PathBuf {
    PathBuf::from(DEFAULT_PLAYBOOKS_DIR)
}

fn default_fixtures() -> PathBuf {
    PathBuf::from(DEFAULT_FIXTURES_DIR)
}

fn default_seed_state() -> PathBuf {
    PathBuf::from(DEFAULT_SEED_STATE)
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            playbooks: default_playbooks(),
            fixtures: default_fixtures(),
            seed_state: default_seed_state(),
            selector_manifest: None,
        }
    }
}

impl PlaycheckConfig {
    /// Pipeline context for a scenario rooted at `root`. Relative paths are
    /// taken relative to the root.
    pub fn scenario_context(&self, root: &Path) -> ScenarioContext {
        let anchor = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            }
        };
        let mut context = ScenarioContext::new(root)
            .with_base_url(self.scenario.base_url.clone())
            .with_fixtures_dir(anchor(&self.paths.fixtures));
        context.playbooks_dir = anchor(&self.paths.playbooks);
        context.seed_path = anchor(&self.paths.seed_state);
        if let Some(manifest) = &self.paths.selector_manifest {
            context = context.with_manifest_path(anchor(manifest));
        }
        context
    }
}
