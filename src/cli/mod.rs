//! CLI module for kmatrix
//!
//! ## Flow
//!
//! 1. Parse flags (clap derive) and initialize logging.
//! 2. Load the config file, overlay the flags, validate.
//! 3. Dispatch one launcher run per kernel version.
//! 4. Render the report and write it to the sink.
//!
//! ## Design
//!
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.
//!
//! ## Exit codes
//!
//! - `0` - every kernel version succeeded
//! - `1` - at least one version failed, was missing or was cancelled
//! - `2` - configuration, startup or report-writing error

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigLayer, DEFAULT_CONFIG_PATH};
use crate::report::ReportFormat;
use crate::version::KMATRIX_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// At least one task did not succeed.
    pub const FAILURE: ExitCode = ExitCode(1);
    /// The run could not be carried out (configuration, runtime or report sink).
    pub const FATAL: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a fatal error (exit code 2).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FATAL)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run a test command against a matrix of guest kernel versions
#[derive(Parser, Debug)]
#[command(name = "kmatrix")]
#[command(version = KMATRIX_VERSION)]
#[command(about = "Run a test command under several kernel versions via virtme-ng", long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short = 'c', long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Absolute path to the vng binary, or a binary name on PATH
    #[arg(long = "vng-path", value_name = "PATH")]
    pub vng_path: Option<String>,

    /// Path and command line of the binary to test (e.g. '/usr/bin/echo Hello World')
    #[arg(long, value_name = "COMMAND")]
    pub cmd: Option<String>,

    /// Number of kernels to run at the same time
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Report file path (prints to stdout if empty)
    #[arg(long = "out-path", value_name = "PATH")]
    pub out_path: Option<String>,

    /// Only print the report, without per-kernel messages
    #[arg(
        long = "report-only",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub report_only: Option<bool>,

    /// Kernel versions to test (e.g. v5.4.293,v5.10)
    #[arg(long = "kernel-versions", value_name = "VERSION", value_delimiter = ',')]
    pub kernel_versions: Vec<String>,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Extra stderr text meaning "kernel image not available" (repeatable)
    #[arg(long = "missing-signature", value_name = "TEXT")]
    pub missing_signatures: Vec<String>,

    /// Log filter (e.g. debug, info, kmatrix=trace); defaults to RUST_LOG, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// The configuration layer set by flags. Unset flags leave the value to the config file.
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            vng_path: self.vng_path.clone(),
            cmd: self.cmd.clone(),
            parallel: self.parallel,
            out_path: self.out_path.clone(),
            report_only: self.report_only,
            kernel_versions: non_empty(&self.kernel_versions),
            format: self.format,
            missing_signatures: non_empty(&self.missing_signatures),
        }
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    let outcome = init_tracing(cli.log_level.as_deref()).and_then(|()| execute(cli));
    match outcome {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute a full run and return the aggregate exit code.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    tracing::info!(version = KMATRIX_VERSION, "kmatrix starting");
    let config = commands::load_config(&cli.config, cli.overrides())?;
    let results = commands::run_matrix(&config)?;
    commands::write_report(&config, &results)
}

/// Install the global tracing subscriber, logging to stderr.
fn init_tracing(level: Option<&str>) -> CliResult<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| CliError::fatal(format!("Invalid log level '{}': {}", level, e)))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
