//! tracegrid — managed-runtime agent compatibility matrix runner.
//!
//! Loads the matrix declaration, wires the container platform, artifact
//! registry and telemetry collector together, runs every variant ×
//! application combination, and renders the report. Exit code is zero
//! only when every case passed.

mod cli;
mod logging;
mod output;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tracegrid_core::config::TracegridConfig;
use tracegrid_engine::{HttpTelemetryCollector, MatrixPlan, MatrixRunner};
use tracegrid_runtime::{BollardPlatform, LocalArtifactRegistry};

use crate::cli::RunCli;
use crate::output::Render;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = RunCli::parse();

    let mut config = TracegridConfig::load(&args.config)
        .await
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    // CLI flags win over both the file and environment overrides
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.general.log_format = format.clone();
    }
    config
        .validate()
        .context("configuration invalid after command-line overrides")?;

    logging::init_tracing(&config.general)?;
    tracegrid_core::metrics::describe_metrics();

    if args.validate {
        println!(
            "configuration OK: {} variant(s), {} application(s)",
            config.variant.len(),
            config.application.len()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut plan = MatrixPlan::expand(&config.variant, &config.application);
    plan.retain_variants(&args.variants);
    plan.retain_applications(&args.applications);
    if plan.case_count() == 0 {
        warn!("matrix plan is empty; nothing to run");
        println!("no cases to run");
        return Ok(ExitCode::SUCCESS);
    }
    info!(
        cases = plan.case_count(),
        variants = plan.groups.len(),
        "matrix plan expanded"
    );

    let platform = Arc::new(
        BollardPlatform::connect_with_socket(&config.platform.docker_socket)
            .context("failed to connect to container platform")?,
    );
    let collector = Arc::new(HttpTelemetryCollector::new(
        config.collector.base_url.as_str(),
    ));
    let registry = Arc::new(LocalArtifactRegistry::new(&config.registry.artifact_dir));
    let runner = MatrixRunner::new(
        platform,
        collector,
        registry,
        config.orchestrator.clone(),
        config.agent.clone(),
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling run");
                cancel.cancel();
            }
        });
    }
    if config.orchestrator.suite_timeout_secs > 0 {
        let cancel = cancel.clone();
        let secs = config.orchestrator.suite_timeout_secs;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(suite_timeout_secs = secs, "suite timeout reached; cancelling run");
            cancel.cancel();
        });
    }

    let report = runner.run(plan, &cancel).await?;

    {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        report.render_text(&mut handle)?;
    }

    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "json report written");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
