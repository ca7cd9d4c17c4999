//! Outcome vocabulary registry.
//!
//! This module centralizes the spellings and report icons for task outcomes so renderers don't
//! need stringly-typed comparisons.

/// Semantic classification of a task's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The launcher exited with status zero.
    Success,
    /// The launcher exited non-zero and the error output is not a missing-kernel signature.
    Failure,
    /// The launcher could not locate or resolve the requested kernel image.
    Missing,
    /// The task never started because cancellation was already in effect.
    Cancelled,
}

/// Metadata entry for an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeInfo {
    pub id: Outcome,
    /// Canonical lowercase spelling (used in machine-readable reports).
    pub canonical: &'static str,
    /// Icon used in human-readable reports.
    pub icon: &'static str,
    pub description: &'static str,
}

/// Registry of all outcomes, in report legend order.
pub const OUTCOMES: &[OutcomeInfo] = &[
    OutcomeInfo {
        id: Outcome::Success,
        canonical: "success",
        icon: "🟢",
        description: "test command succeeded",
    },
    OutcomeInfo {
        id: Outcome::Failure,
        canonical: "failure",
        icon: "🔴",
        description: "test command failed",
    },
    OutcomeInfo {
        id: Outcome::Missing,
        canonical: "missing",
        icon: "🟡",
        description: "kernel image not available",
    },
    OutcomeInfo {
        id: Outcome::Cancelled,
        canonical: "cancelled",
        icon: "⚠️",
        description: "not started (cancelled)",
    },
];

impl Outcome {
    /// Look up the registry entry for this outcome.
    pub fn info(self) -> &'static OutcomeInfo {
        match self {
            Outcome::Success => &OUTCOMES[0],
            Outcome::Failure => &OUTCOMES[1],
            Outcome::Missing => &OUTCOMES[2],
            Outcome::Cancelled => &OUTCOMES[3],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.info().canonical
    }

    pub fn icon(self) -> &'static str {
        self.info().icon
    }
}

/// Resolve a canonical spelling to its outcome.
pub fn from_str(name: &str) -> Option<Outcome> {
    OUTCOMES.iter().find(|info| info.canonical == name).map(|info| info.id)
}
