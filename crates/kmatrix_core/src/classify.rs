//! Outcome classification from a finished launcher invocation.
//!
//! ## Notes
//!
//! - Matching is plain substring containment on the captured stderr.
//! - The built-in signatures track the wording of virtme-ng (tested against `1.33+93.g62b9b2f`).
//!   Newer launcher releases may word these errors differently; extra signatures can be added with
//!   [`OutcomeClassifier::with_extra_signatures`].
//! - An unmatched non-zero exit is always a [`Outcome::Failure`], never a [`Outcome::Missing`].

use crate::Outcome;

/// Substring emitted when the launcher cannot fetch the requested kernel image.
pub const KERNEL_NOT_RETRIEVABLE: &str = "failed to retrieve content";

/// Substring emitted when the requested kernel image name does not resolve.
pub const KERNEL_DOES_NOT_EXIST: &str = "does not exist";

/// Built-in stderr signatures meaning "the kernel image could not be located".
pub const MISSING_KERNEL_SIGNATURES: &[&str] = &[KERNEL_NOT_RETRIEVABLE, KERNEL_DOES_NOT_EXIST];

/// Classify an invocation using the built-in signatures.
///
/// ## Parameters
/// - `exit_succeeded`: whether the launcher exited with status zero.
/// - `stdout`: captured standard output (becomes the message on success).
/// - `stderr`: captured standard error (classified, and the message otherwise).
///
/// ## Returns
/// - `(Outcome, String)`: the outcome and the message to store on the result.
///
/// ## Examples
/// ```rust
/// use kmatrix_core::{Outcome, classify};
///
/// let (outcome, message) = classify(false, String::new(), "failed to retrieve content".into());
/// assert_eq!(outcome, Outcome::Missing);
/// assert_eq!(message, "failed to retrieve content");
/// ```
pub fn classify(exit_succeeded: bool, stdout: String, stderr: String) -> (Outcome, String) {
    OutcomeClassifier::default().classify(exit_succeeded, stdout, stderr)
}

/// Classifier holding the built-in signatures plus any configured extras.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeClassifier {
    extra_signatures: Vec<String>,
}

impl OutcomeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add signatures on top of [`MISSING_KERNEL_SIGNATURES`]. Empty strings are ignored.
    pub fn with_extra_signatures<I, S>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_signatures.extend(
            signatures
                .into_iter()
                .map(Into::into)
                .filter(|sig: &String| !sig.is_empty()),
        );
        self
    }

    /// All signatures in match order: built-ins first, then extras.
    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        MISSING_KERNEL_SIGNATURES
            .iter()
            .copied()
            .chain(self.extra_signatures.iter().map(String::as_str))
    }

    /// Check whether the stderr text denotes a missing kernel image.
    pub fn is_missing_kernel(&self, stderr: &str) -> bool {
        self.signatures().any(|sig| !sig.is_empty() && stderr.contains(sig))
    }

    /// Same contract as [`classify`], using this classifier's signature set.
    pub fn classify(&self, exit_succeeded: bool, stdout: String, stderr: String) -> (Outcome, String) {
        if exit_succeeded {
            (Outcome::Success, stdout)
        } else if self.is_missing_kernel(&stderr) {
            (Outcome::Missing, stderr)
        } else {
            (Outcome::Failure, stderr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_ignores_stderr() {
        let (outcome, message) = classify(true, "hello\n".into(), "does not exist".into());
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(message, "hello\n");
    }

    #[test]
    fn test_missing_retrieve() {
        let stderr = "Error: failed to retrieve content from https://kernel.ubuntu.com/...\n";
        let (outcome, message) = classify(false, String::new(), stderr.into());
        assert_eq!(outcome, Outcome::Missing);
        assert_eq!(message, stderr);
    }

    #[test]
    fn test_missing_wrong_name() {
        let (outcome, _) = classify(false, String::new(), "kernel wrong-name does not exist".into());
        assert_eq!(outcome, Outcome::Missing);
    }

    #[test]
    fn test_unmatched_failure() {
        let (outcome, message) = classify(false, "partial".into(), "assertion failed".into());
        assert_eq!(outcome, Outcome::Failure);
        assert_eq!(message, "assertion failed");
    }

    #[test]
    fn test_empty_stderr_is_failure() {
        let (outcome, message) = classify(false, String::new(), String::new());
        assert_eq!(outcome, Outcome::Failure);
        assert!(message.is_empty());
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let (outcome, _) = classify(false, String::new(), "Does Not Exist".into());
        assert_eq!(outcome, Outcome::Failure);
    }

    #[test]
    fn test_extra_signature() {
        let classifier = OutcomeClassifier::new().with_extra_signatures(["no such kernel"]);
        let (outcome, _) = classifier.classify(false, String::new(), "vng: no such kernel v9.9".into());
        assert_eq!(outcome, Outcome::Missing);
        // built-ins still apply
        assert!(classifier.is_missing_kernel("failed to retrieve content"));
    }

    #[test]
    fn test_empty_extra_signature_ignored() {
        let classifier = OutcomeClassifier::new().with_extra_signatures([""]);
        assert_eq!(classifier.signatures().count(), MISSING_KERNEL_SIGNATURES.len());
        assert!(!classifier.is_missing_kernel("anything"));
    }

    #[test]
    fn test_default_classifier_agrees_with_free_fn() {
        let classifier = OutcomeClassifier::default();
        for stderr in ["", "boom", "does not exist", "failed to retrieve content"] {
            assert_eq!(
                classifier.classify(false, String::new(), stderr.into()),
                classify(false, String::new(), stderr.into())
            );
        }
    }
}
