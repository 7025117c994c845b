use crate::core::config::LoggingSection;
use crate::logging::layers::console::ConsoleOutput;
use crate::Result;
use anyhow::anyhow;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::Directive;

const DEFAULT_LEVEL: &str = "warn";

/// Resolved logging configuration after reading the `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
    pub default_level: String,
    pub enable_file: bool,
    pub console_output: ConsoleOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            default_level: DEFAULT_LEVEL.to_string(),
            enable_file: false,
            console_output: ConsoleOutput::Stderr,
        }
    }
}

impl LoggingConfig {
    /// Defaults overlaid with the values present in `section`.
    pub fn from_section(section: &LoggingSection) -> Result<Self> {
        let mut config = LoggingConfig::default();
        if let Some(log_dir) = &section.log_dir {
            config.log_dir = Some(PathBuf::from(log_dir));
        }
        if let Some(default_level) = &section.default_level {
            config.default_level = default_level.clone();
        }
        if let Some(enable_file) = section.enable_file {
            config.enable_file = enable_file;
        }
        if let Some(console_output) = &section.console_output {
            config.console_output = ConsoleOutput::from_str(console_output).map_err(|err| anyhow!(err))?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Raise the level for `--verbose`; an explicit `RUST_LOG` still wins.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.default_level = "debug".to_string();
        }
        self
    }

    fn validate(&self) -> Result<()> {
        Directive::from_str(&self.default_level)
            .map_err(|_| anyhow!("logging.default_level must be a valid tracing directive"))?;
        Ok(())
    }
}
