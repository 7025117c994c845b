use clap::Args;
use std::path::PathBuf;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Workflow definition (JSON) to validate
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Promote flakiness-prone warnings to WF_STRICT_WARNING errors
    #[arg(long, help_heading = "Validation Options")]
    pub strict: bool,

    /// Also resolve fixtures, selectors and scenarios and report their diagnostics
    #[arg(long, help_heading = "Validation Options")]
    pub resolve: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Workflow definition (JSON) to resolve
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Promote flakiness-prone warnings to WF_STRICT_WARNING errors
    #[arg(long, help_heading = "Validation Options")]
    pub strict: bool,

    /// Print only the cleaned definition instead of the full resolution document
    #[arg(long, help_heading = "Output Options")]
    pub definition_only: bool,
}

#[derive(Args, Clone, Debug)]
pub struct PreflightArgs {
    /// Workflow files to scan (default: every *.json under the playbooks directory)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateV2Args {
    /// V2 workflow definition (proto JSON) to validate
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}
