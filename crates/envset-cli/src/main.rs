//! `envset` binary

use std::process::ExitCode;

use anyhow::Context;
use clap::ArgMatches;
use envset_cli::{command, GenerateArgs, OutputWriter};
use envset_core::{EffectiveSetGenerator, EnvironmentInventory};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let matches = command().get_matches();
    match matches.subcommand() {
        Some(("generate", args)) => match generate(args) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                tracing::error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        _ => ExitCode::SUCCESS,
    }
}

/// Run one generation; `Ok(false)` when some application failed.
fn generate(matches: &ArgMatches) -> anyhow::Result<bool> {
    let args = GenerateArgs::from_matches(matches)?;
    let inventory = EnvironmentInventory::from_path(&args.inventory)
        .with_context(|| format!("loading inventory {}", args.inventory.display()))?;

    let report = EffectiveSetGenerator::new(args.config.clone()).generate(&inventory)?;
    let files = OutputWriter::new(&args.output)
        .with_traceability(args.config.enable_traceability)
        .write(&report)
        .with_context(|| format!("writing effective set to {}", args.output.display()))?;
    tracing::info!(
        "Wrote {} files for {} applications to {}",
        files,
        report.applications.len(),
        args.output.display()
    );

    if let Err(e) = report.ensure_success() {
        for (application, message) in &report.failures {
            tracing::error!("{}: {}", application, message);
        }
        tracing::error!("{}", e);
        return Ok(false);
    }
    Ok(true)
}
