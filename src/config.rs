//! Run configuration: acquisition, precedence and validation.
//!
//! Values come from three layers, highest precedence first:
//! 1. command-line flags,
//! 2. the YAML config file,
//! 3. built-in defaults.
//!
//! A missing config file is not an error (defaults are used). A config file that exists but cannot
//! be read or parsed is. Validation runs once on the merged values, before any task is dispatched.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use kmatrix_core::{KernelVersion, OutcomeClassifier};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::engine::{ConcurrencyLimit, TestCommand};
use crate::report::{ReportFormat, ReportSink};

pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
pub const DEFAULT_LAUNCHER: &str = "vng";
pub const DEFAULT_PARALLEL: usize = 1;

/// Fatal configuration problems. Detected before dispatch; no results are produced.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config file '{}'", .path.display())]
    #[diagnostic(code(kmatrix::config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse config file '{}'", .path.display())]
    #[diagnostic(
        code(kmatrix::config::parse),
        help(
            "known keys: vng_path, cmd, parallel, out_path, report_only, kernel_versions, format, missing_signatures"
        )
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("'vng' binary not found at '{0}'")]
    #[diagnostic(
        code(kmatrix::config::launcher),
        help("use an absolute path, or a binary name that is on PATH")
    )]
    LauncherNotFound(String),

    #[error("'cmd' is empty")]
    #[diagnostic(code(kmatrix::config::cmd), help("e.g. --cmd '/usr/bin/echo Hello World'"))]
    EmptyCommand,

    #[error("tested binary not found at '{0}'")]
    #[diagnostic(code(kmatrix::config::cmd))]
    CommandNotFound(String),

    #[error("'parallel' must be at least 1")]
    #[diagnostic(code(kmatrix::config::parallel))]
    ZeroParallelism,

    #[error("'kernel_versions' cannot be empty")]
    #[diagnostic(code(kmatrix::config::kernel_versions), help("e.g. --kernel-versions v5.4.293,v6.1"))]
    NoKernelVersions,

    #[error("'kernel_versions' entry {0} is empty")]
    #[diagnostic(code(kmatrix::config::kernel_versions))]
    EmptyKernelVersion(usize),
}

/// One layer of optional settings (a config file, or the command-line flags).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub vng_path: Option<String>,
    pub cmd: Option<String>,
    pub parallel: Option<usize>,
    pub out_path: Option<String>,
    pub report_only: Option<bool>,
    pub kernel_versions: Option<Vec<String>>,
    pub format: Option<ReportFormat>,
    pub missing_signatures: Option<Vec<String>>,
}

impl ConfigLayer {
    /// Parse a YAML document. An empty document is an empty layer.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source)
    }

    /// Load a config file. A file that does not exist yields an empty layer.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let layer = Self::from_yaml(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "using config file");
        Ok(layer)
    }

    /// Combine two layers; values set in `over` win.
    pub fn overlay(self, over: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            vng_path: over.vng_path.or(self.vng_path),
            cmd: over.cmd.or(self.cmd),
            parallel: over.parallel.or(self.parallel),
            out_path: over.out_path.or(self.out_path),
            report_only: over.report_only.or(self.report_only),
            kernel_versions: over.kernel_versions.or(self.kernel_versions),
            format: over.format.or(self.format),
            missing_signatures: over.missing_signatures.or(self.missing_signatures),
        }
    }

    /// Fill in defaults and validate.
    pub fn resolve(self) -> Result<RunConfig, ConfigError> {
        let vng_path = self.vng_path.unwrap_or_else(|| DEFAULT_LAUNCHER.to_string());
        let launcher = resolve_executable(&vng_path).ok_or(ConfigError::LauncherNotFound(vng_path))?;

        let command = TestCommand::parse(self.cmd.as_deref().unwrap_or_default()).ok_or(ConfigError::EmptyCommand)?;
        if resolve_executable(&command.program).is_none() {
            return Err(ConfigError::CommandNotFound(command.program));
        }

        let parallel =
            ConcurrencyLimit::new(self.parallel.unwrap_or(DEFAULT_PARALLEL)).ok_or(ConfigError::ZeroParallelism)?;

        let labels = self.kernel_versions.unwrap_or_default();
        if labels.is_empty() {
            return Err(ConfigError::NoKernelVersions);
        }
        if let Some(index) = labels.iter().position(|label| label.trim().is_empty()) {
            return Err(ConfigError::EmptyKernelVersion(index));
        }

        Ok(RunConfig {
            launcher,
            command,
            parallel,
            sink: ReportSink::from_out_path(self.out_path.as_deref().unwrap_or_default()),
            report_only: self.report_only.unwrap_or(false),
            format: self.format.unwrap_or_default(),
            kernel_versions: labels.into_iter().map(KernelVersion::from).collect(),
            classifier: OutcomeClassifier::new().with_extra_signatures(self.missing_signatures.unwrap_or_default()),
        })
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Resolved path of the launcher binary.
    pub launcher: PathBuf,
    pub command: TestCommand,
    pub parallel: ConcurrencyLimit,
    pub sink: ReportSink,
    /// Suppress per-task messages in the report.
    pub report_only: bool,
    pub format: ReportFormat,
    pub kernel_versions: Vec<KernelVersion>,
    pub classifier: OutcomeClassifier,
}

/// Resolve a binary the way a shell would.
///
/// Names containing a path separator are checked directly; bare names are searched on `PATH`.
pub fn resolve_executable(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() || path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    if name.is_empty() {
        return None;
    }
    let search_path = env::var_os("PATH")?;
    env::split_paths(&search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
