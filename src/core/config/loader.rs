#![allow(clippy::result_large_err)]

use super::PlaycheckConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

pub const CONFIG_FILE: &str = "playcheck.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the scenario root (root/playcheck.toml).
    /// Environment variables override config file values; a missing file
    /// means defaults plus env vars.
    pub fn load_from_workspace(root: &Path) -> Result<PlaycheckConfig, AppError> {
        let config_path = root.join(CONFIG_FILE);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Returns Ok(None) if the file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<PlaycheckConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: PlaycheckConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_context("path", path.display().to_string())
        })?;

        Ok(Some(config))
    }

    fn apply_env_overrides(config: &mut PlaycheckConfig) {
        if let Some(base_url) = non_empty_var("PLAYCHECK_BASE_URL") {
            config.scenario.base_url = base_url;
        }

        if let Some(manifest) = non_empty_var("PLAYCHECK_SELECTOR_MANIFEST") {
            config.paths.selector_manifest = Some(PathBuf::from(manifest));
        }

        if let Some(fixtures) = non_empty_var("PLAYCHECK_FIXTURES_DIR") {
            config.paths.fixtures = PathBuf::from(fixtures);
        }

        if let Some(seed_state) = non_empty_var("PLAYCHECK_SEED_STATE") {
            config.paths.seed_state = PathBuf::from(seed_state);
        }

        if let Some(strict) = non_empty_var("PLAYCHECK_STRICT") {
            if let Ok(strict) = strict.parse::<bool>() {
                config.validation.strict = strict;
            }
        }
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "PLAYCHECK_BASE_URL - Override the scenario UI base URL",
            "PLAYCHECK_SELECTOR_MANIFEST - Use this selector manifest instead of discovering one",
            "PLAYCHECK_FIXTURES_DIR - Override the fixtures directory (default: test/playbooks/__subflows)",
            "PLAYCHECK_SEED_STATE - Override the seed state file (default: test/playbooks/__seeds/seed-state.json)",
            "PLAYCHECK_STRICT - Enable strict mode by default (true/false)",
        ]
    }

    /// Validate configuration values
    pub fn validate_config(config: &PlaycheckConfig) -> Result<(), AppError> {
        if !config.scenario.base_url.is_empty() {
            check_url("scenario.base_url", &config.scenario.base_url)?;
        }

        for (name, base_url) in &config.scenarios {
            if name.trim().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ConfigError,
                    "scenario names in [scenarios] cannot be empty",
                ));
            }
            check_url(&format!("scenarios.{}", name), base_url)?;
        }

        if config.paths.fixtures.as_os_str().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "paths.fixtures cannot be empty",
            ));
        }

        if config.paths.playbooks.as_os_str().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "paths.playbooks cannot be empty",
            ));
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn check_url(key: &str, value: &str) -> Result<(), AppError> {
    let parsed = Url::parse(value).map_err(|e| {
        AppError::new(
            ErrorCategory::ConfigError,
            format!("{} is not a valid URL: {}", key, e),
        )
        .with_context("value", value)
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::new(
            ErrorCategory::ConfigError,
            format!("{} must use http or https, got {}", key, parsed.scheme()),
        ));
    }
    Ok(())
}
