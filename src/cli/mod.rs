pub mod args;
pub mod commands;
pub mod context;

pub use args::{PreflightArgs, ResolveArgs, ValidateArgs, ValidateV2Args};
pub use context::CliContext;

use crate::logging::{self, LoggingConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PLAYBOOK COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "playcheck")]
#[command(version = crate::VERSION)]
#[command(about = "Validate, resolve, and preflight JSON browser-automation playbooks")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: preflight the scenario, validate each playbook with --strict, then resolve it for the execution backend."
)]
pub struct Args {
    /// Scenario root holding playcheck.toml and test/playbooks (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Check a playbook against the schema and lint rules",
        long_about = "Validate reports every schema, node-rule and edge diagnostic in one pass. With --resolve it also expands fixtures, selectors and scenario navigation and reports what failed.",
        after_help = "Example:\n    playcheck validate test/playbooks/login.json --strict"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Resolve a playbook into its cleaned, dispatchable form",
        long_about = "Resolve inlines fixtures, substitutes selectors and placeholders, rewrites scenario navigation, and prints the cleaned definition with its metadata and initial parameters.",
        after_help = "Example:\n    playcheck resolve test/playbooks/checkout.json --definition-only"
    )]
    Resolve(ResolveArgs),
    #[command(
        about = "Statically scan playbooks for fixture, selector and seed references",
        long_about = "Preflight checks references without resolving them. Without FILES it scans every *.json under the scenario playbooks directory.",
        after_help = "Example:\n    playcheck preflight --root ./scenarios/billing"
    )]
    Preflight(PreflightArgs),
    #[command(
        name = "validate-v2",
        about = "Validate a typed V2 playbook",
        after_help = "Example:\n    playcheck validate-v2 flows/login.v2.json"
    )]
    ValidateV2(ValidateV2Args),
}

/// Run the parsed command. `Ok(false)` means the input is invalid.
pub async fn run(args: Args) -> crate::Result<bool> {
    let cancel = CancellationToken::new();
    let ctx = CliContext::load(args.root, cancel.clone())?;

    let logging_config = LoggingConfig::from_section(&ctx.config.logging)?.with_verbose(args.verbose);
    let logging_guard = logging::init(&logging_config, &ctx.root)?;
    debug!(
        console = ?logging_guard.console_output(),
        log_file = ?logging_guard.log_file_path(),
        root = %ctx.root.display(),
        "logging ready"
    );

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling pipeline");
            interrupt.cancel();
        }
    });

    match args.command {
        Command::Validate(validate_args) => commands::validate(&ctx, validate_args).await,
        Command::Resolve(resolve_args) => commands::resolve(&ctx, resolve_args).await,
        Command::Preflight(preflight_args) => commands::preflight(&ctx, preflight_args).await,
        Command::ValidateV2(v2_args) => commands::validate_v2(v2_args).await,
    }
}
