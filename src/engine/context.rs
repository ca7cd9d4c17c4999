//! Shared cancellation token for one run.

use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation context shared by the scheduler, every task runner and the signal listener.
///
/// Cloning is cheap; all clones observe the same flag. Once cancelled, a context never returns
/// to the not-cancelled state.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    state: Arc<watch::Sender<bool>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state: Arc::new(state) }
    }

    /// Cancel the context.
    ///
    /// Returns `true` only for the call that performed the transition; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.state.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once the context is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        while !*rx.borrow_and_update() {
            // The sender lives as long as `self`, so this only fails if the process is tearing down.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
