//! Provide the shared, pure vocabulary of the kmatrix kernel test runner.
//!
//! This crate is intentionally small and dependency-free. It contains the data model that both the
//! execution engine and the report assembler agree on:
//! - [`KernelVersion`]: the opaque label handed to the launcher,
//! - [`Outcome`] and its registry ([`outcome::OUTCOMES`]),
//! - [`TaskResult`]: one result per kernel version,
//! - the [`classify`] helpers that map an exit status and captured output to an [`Outcome`].
//!
//! ## Notes
//!
//! - This is a "semantic core" crate: **no IO**, no global state, no async runtime.
//! - The missing-kernel signatures are tied to the wording of the launcher's error messages. They live
//!   in [`classify`] so they can be updated without touching the engine.

pub mod classify;
pub mod outcome;

use std::fmt;

pub use classify::{MISSING_KERNEL_SIGNATURES, OutcomeClassifier, classify};
pub use outcome::Outcome;

/// Message stored on results that were never started.
pub const CANCELLED_MESSAGE: &str = "Cancelled";

/// Opaque label identifying a guest kernel image (for example `v5.4.293`).
///
/// The runner never interprets the label; it is passed verbatim to the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelVersion(String);

impl KernelVersion {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KernelVersion {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for KernelVersion {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Result of testing one kernel version.
///
/// `message` holds the captured stdout on success, the captured stderr otherwise, or
/// [`CANCELLED_MESSAGE`] for tasks that never started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub version: KernelVersion,
    pub outcome: Outcome,
    pub message: String,
}

impl TaskResult {
    pub fn new(version: KernelVersion, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            version,
            outcome,
            message: message.into(),
        }
    }

    /// Build the result for a version skipped because cancellation was already in effect.
    pub fn cancelled(version: KernelVersion) -> Self {
        Self::new(version, Outcome::Cancelled, CANCELLED_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> version: {}, message: '{}'",
            self.outcome.icon(),
            self.version,
            self.message
        )
    }
}
