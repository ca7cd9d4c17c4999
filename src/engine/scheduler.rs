//! Bounded-concurrency dispatcher.
//!
//! ## Algorithm
//!
//! 1. One slot per input index is reserved up front.
//! 2. Versions are visited in input order. If the context is already cancelled when an index is
//!    reached (or becomes cancelled while the index waits for admission), the slot is filled with a
//!    `Cancelled` result without consuming a permit.
//! 3. Otherwise the loop acquires one of `limit` permits, blocking while all are taken, and spawns
//!    the runner for that version. The permit is released when the task finishes.
//! 4. Every spawned task is awaited before the slots are returned.
//!
//! Each task owns exactly one slot, so the returned sequence always matches input order no matter
//! which task finishes first.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use kmatrix_core::{KernelVersion, Outcome, TaskResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use super::context::ExecutionContext;
use super::runner::TaskRunner;

/// Maximum number of simultaneously running tasks (always at least one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConcurrencyLimit(NonZeroUsize);

impl ConcurrencyLimit {
    /// A limit of one: tasks run strictly one after another.
    pub const SERIAL: ConcurrencyLimit = ConcurrencyLimit(NonZeroUsize::MIN);

    /// Returns `None` for zero.
    pub fn new(limit: usize) -> Option<Self> {
        NonZeroUsize::new(limit).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::SERIAL
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result slot for one input index.
enum Slot {
    Done(TaskResult),
    Running {
        version: KernelVersion,
        handle: JoinHandle<TaskResult>,
    },
}

impl Slot {
    async fn into_result(self) -> TaskResult {
        match self {
            Slot::Done(result) => result,
            Slot::Running { version, handle } => match handle.await {
                Ok(result) => result,
                Err(e) => TaskResult::new(version, Outcome::Failure, format!("task did not complete: {e}")),
            },
        }
    }
}

/// Run `runner` once per version with at most `limit` tasks in flight.
///
/// ## Returns
/// - One [`TaskResult`] per input version, in input order.
///
/// ## Notes
/// - Individual failures never stop the run; there are no retries.
/// - Cancellation is checked at admission. Tasks admitted before cancellation are left to the
///   runner, which is expected to stop promptly once `ctx` is cancelled.
pub async fn dispatch<R>(
    versions: &[KernelVersion],
    limit: ConcurrencyLimit,
    ctx: &ExecutionContext,
    runner: Arc<R>,
) -> Vec<TaskResult>
where
    R: TaskRunner + 'static,
{
    let permits = Arc::new(Semaphore::new(limit.get()));
    let mut slots: Vec<Slot> = Vec::with_capacity(versions.len());

    for (index, version) in versions.iter().enumerate() {
        let Some(permit) = admit(&permits, ctx).await else {
            debug!(index, %version, "cancellation in effect, not starting");
            slots.push(Slot::Done(TaskResult::cancelled(version.clone())));
            continue;
        };

        debug!(index, %version, "admitted");
        let handle = {
            let runner = Arc::clone(&runner);
            let ctx = ctx.clone();
            let version = version.clone();
            tokio::spawn(async move {
                let _permit = permit;
                runner.run(&ctx, &version).await
            })
        };
        slots.push(Slot::Running {
            version: version.clone(),
            handle,
        });
    }

    let mut results = Vec::with_capacity(slots.len());
    for slot in slots {
        results.push(slot.into_result().await);
    }
    results
}

/// Wait for a free permit unless the run is (or becomes) cancelled first.
async fn admit(permits: &Arc<Semaphore>, ctx: &ExecutionContext) -> Option<OwnedSemaphorePermit> {
    if ctx.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        () = ctx.cancelled() => None,
        // The semaphore is never closed, so acquisition only fails if that changes.
        permit = Arc::clone(permits).acquire_owned() => permit.ok(),
    }
}
