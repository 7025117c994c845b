use crate::core::workflow_graph::Pipeline;
use crate::core::{ConfigLoader, PlaycheckConfig};
use crate::Result;
use anyhow::{anyhow, Context};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything a subcommand needs: the scenario root, its configuration and
/// a pipeline wired to both.
pub struct CliContext {
    pub root: PathBuf,
    pub config: PlaycheckConfig,
    pub cancel: CancellationToken,
}

impl CliContext {
    pub fn load(root: Option<PathBuf>, cancel: CancellationToken) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("failed to determine the current directory")?,
        };
        let config = ConfigLoader::load_from_workspace(&root)?;
        Ok(Self { root, config, cancel })
    }

    pub fn pipeline(&self) -> Pipeline {
        let scenarios = self.config.scenarios.clone();
        Pipeline::new(self.config.scenario_context(&self.root))
            .with_resolver(move |name: &str| resolve_scenario(&scenarios, name))
            .with_cancellation(self.cancel.clone())
    }
}

fn resolve_scenario(scenarios: &BTreeMap<String, String>, name: &str) -> anyhow::Result<String> {
    scenarios
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("scenario `{}` is not listed under [scenarios] in playcheck.toml", name))
}
