use crate::{
    cli::args::{PreflightArgs, ResolveArgs, ValidateArgs, ValidateV2Args},
    cli::context::CliContext,
    core::workflow_graph::{
        preflight::{aggregate, discover_workflows},
        schema::load_definition,
        v2::validate_v2_json,
        ValidateOptions,
    },
    Result,
};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{}", rendered);
    Ok(())
}

/// `playcheck validate`: schema and lint, optionally followed by resolution.
pub async fn validate(ctx: &CliContext, args: ValidateArgs) -> Result<bool> {
    let definition = load_definition(&args.file)?;
    let options = ValidateOptions {
        strict: args.strict || ctx.config.validation.strict,
        resolve: args.resolve,
    };
    debug!(file = %args.file.display(), ?options, "validating workflow");
    let result = ctx.pipeline().validate(&definition, options)?;
    print_json(&result)?;
    Ok(result.valid)
}

/// `playcheck resolve`: produce the cleaned definition for the execution backend.
pub async fn resolve(ctx: &CliContext, args: ResolveArgs) -> Result<bool> {
    let definition = load_definition(&args.file)?;
    let strict = args.strict || ctx.config.validation.strict;
    let resolved = ctx.pipeline().resolve(definition, strict)?;
    if args.definition_only {
        print_json(&resolved.definition)?;
    } else {
        print_json(&resolved)?;
    }
    Ok(resolved.result.valid)
}

/// `playcheck preflight`: scan files in parallel on the blocking pool.
pub async fn preflight(ctx: &CliContext, args: PreflightArgs) -> Result<bool> {
    let pipeline = Arc::new(ctx.pipeline());
    let files = if args.files.is_empty() {
        discover_workflows(&pipeline.context().playbooks_dir)
    } else {
        args.files
    };
    info!(files = files.len(), "starting preflight");

    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            tokio::task::spawn_blocking(move || pipeline.preflight_file(&path))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await.context("preflight task failed")??);
    }

    let report = aggregate(reports);
    print_json(&report)?;
    Ok(report.valid)
}

/// `playcheck validate-v2`: typed V2 validation.
pub async fn validate_v2(args: ValidateV2Args) -> Result<bool> {
    let raw = load_definition(&args.file)?;
    let result = validate_v2_json(&raw);
    print_json(&result)?;
    Ok(result.valid)
}
