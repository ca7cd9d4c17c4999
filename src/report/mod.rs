//! Report assembly
//!
//! Turns the ordered result sequence into text and writes it to the configured sink.
//!
//! ## ReportRenderer Trait
//!
//! Rendering is separated from execution by the `ReportRenderer` trait. The strategy is chosen from
//! configuration (`format` and `report_only`), never inside the scheduler.
//!
//! ## Modules
//!
//! - `render` - list, markdown and JSON renderers

pub mod render;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::ValueEnum;
use kmatrix_core::{Outcome, TaskResult};
use serde::Deserialize;
use thiserror::Error;

pub use render::{JsonReport, ListReport, MarkdownReport};

/// Trait for rendering a finished run.
///
/// Implement this trait to add an output format.
pub trait ReportRenderer {
    fn render(&self, results: &[TaskResult]) -> String;
}

/// Available report formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `- <version> <icon>` lines, optionally followed by the message
    List,
    /// Messages section followed by a version/outcome table
    #[default]
    Markdown,
    /// Machine-readable results and summary
    Json,
}

/// Pick the renderer for a format. `report_only` drops the per-task messages.
pub fn renderer(format: ReportFormat, report_only: bool) -> Box<dyn ReportRenderer> {
    let show_messages = !report_only;
    match format {
        ReportFormat::List => Box::new(ListReport { show_messages }),
        ReportFormat::Markdown => Box::new(MarkdownReport { show_messages }),
        ReportFormat::Json => Box::new(JsonReport { show_messages }),
    }
}

/// Per-outcome counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub missing: usize,
    pub cancelled: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TaskResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..RunSummary::default()
        };
        for result in results {
            match result.outcome {
                Outcome::Success => summary.succeeded += 1,
                Outcome::Failure => summary.failed += 1,
                Outcome::Missing => summary.missing += 1,
                Outcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// `true` when every task succeeded. Drives the process exit status.
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Report sink errors. Fatal, but only after dispatch has completed.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("error writing report to '{}': {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing report to stdout: {0}")]
    Stdout(#[source] io::Error),
}

/// Where the report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSink {
    Stdout,
    File(PathBuf),
}

impl ReportSink {
    /// An empty output path means standard output.
    pub fn from_out_path(out_path: &str) -> Self {
        if out_path.is_empty() {
            ReportSink::Stdout
        } else {
            ReportSink::File(PathBuf::from(out_path))
        }
    }

    pub fn write(&self, report: &str) -> Result<(), ReportError> {
        match self {
            ReportSink::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(report.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(ReportError::Stdout)
            }
            ReportSink::File(path) => fs::write(path, report).map_err(|source| ReportError::File {
                path: path.clone(),
                source,
            }),
        }
    }
}
