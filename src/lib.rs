#![forbid(unsafe_code)]
//! kmatrix: kernel compatibility-matrix test runner
//!
//! Runs one test command inside several guest kernels (booted by an external launcher such as
//! virtme-ng's `vng`) and reports, per kernel version, whether it succeeded.
//!
//! This crate provides the execution engine (bounded-concurrency scheduler, launcher task runner,
//! signal-driven cancellation), configuration loading, report rendering and the CLI.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module
//!   enforces `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Task failures**: a failing, missing or cancelled kernel version is a result, never an error.

pub mod cli;
pub mod config;
pub mod engine;
pub mod report;
pub mod version;

pub use kmatrix_core::{KernelVersion, Outcome, TaskResult};

pub use config::{ConfigError, ConfigLayer, RunConfig};
pub use engine::{ConcurrencyLimit, ExecutionContext, LauncherRunner, TaskRunner, TestCommand, dispatch};
pub use report::{ReportFormat, ReportRenderer, ReportSink, RunSummary};
