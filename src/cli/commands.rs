//! CLI command implementations
//!
//! All command functions return `CliResult<T>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::path::Path;
use std::sync::Arc;

use kmatrix_core::TaskResult;
use tracing::info;

use crate::config::{ConfigLayer, RunConfig};
use crate::engine::{ExecutionContext, LauncherRunner, dispatch, spawn_cancellation_source};
use crate::report::{self, RunSummary};

use super::{CliError, CliResult, ExitCode};

/// Load the config file, apply flag overrides and validate.
///
/// Configuration errors are rendered as miette diagnostics.
pub fn load_config(config_path: &Path, overrides: ConfigLayer) -> CliResult<RunConfig> {
    let config = ConfigLayer::load(config_path)
        .and_then(|file| file.overlay(overrides).resolve())
        .map_err(|e| CliError::fatal(format!("{:?}", miette::Report::new(e))))?;

    info!(
        launcher = %config.launcher.display(),
        cmd = ?config.command,
        parallel = %config.parallel,
        sink = ?config.sink,
        report_only = config.report_only,
        format = ?config.format,
        kernel_versions = ?config.kernel_versions,
        "final configuration"
    );
    Ok(config)
}

/// Run the matrix on a fresh multi-threaded runtime.
pub fn run_matrix(config: &RunConfig) -> CliResult<Vec<TaskResult>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::fatal(format!("Error starting async runtime: {}", e)))?;
    runtime.block_on(run_matrix_async(config))
}

/// Listen for SIGINT/SIGTERM for the duration of the run and dispatch every kernel version.
pub async fn run_matrix_async(config: &RunConfig) -> CliResult<Vec<TaskResult>> {
    let ctx = ExecutionContext::new();
    let listener = spawn_cancellation_source(ctx.clone())
        .map_err(|e| CliError::fatal(format!("Error installing signal handlers: {}", e)))?;

    let runner = Arc::new(
        LauncherRunner::new(&config.launcher, config.command.clone()).with_classifier(config.classifier.clone()),
    );
    let results = dispatch(&config.kernel_versions, config.parallel, &ctx, runner).await;

    listener.abort();
    Ok(results)
}

/// Render and write the report, then map the results to the process exit code.
pub fn write_report(config: &RunConfig, results: &[TaskResult]) -> CliResult<ExitCode> {
    let summary = RunSummary::from_results(results);
    info!(
        total = summary.total,
        success = summary.succeeded,
        failure = summary.failed,
        missing = summary.missing,
        cancelled = summary.cancelled,
        "run complete"
    );

    let rendered = report::renderer(config.format, config.report_only).render(results);
    config
        .sink
        .write(&rendered)
        .map_err(|e| CliError::fatal(e.to_string()))?;

    Ok(if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
