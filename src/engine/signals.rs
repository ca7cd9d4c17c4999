//! Cancellation source: converts operator signals into cancellation of the run's context.
//!
//! Only SIGINT and SIGTERM are handled. The first one cancels the context and prints a single
//! notice to stderr; later signals find the context already cancelled and do nothing.

use std::io::{self, Write};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::context::ExecutionContext;

/// Notice printed on the first shutdown signal.
pub const SHUTDOWN_NOTICE: &str = "Interrupt received, shutting down...";

/// Signals that trigger cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    pub fn name(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

/// React to one received signal.
///
/// Returns `true` if this signal cancelled the context. The notice is written only in that case.
pub fn handle_signal(ctx: &ExecutionContext, signal: ShutdownSignal, notice: &mut impl Write) -> bool {
    if !ctx.cancel() {
        debug!(signal = signal.name(), "run already cancelled, ignoring signal");
        return false;
    }
    warn!(signal = signal.name(), "cancelling pending kernel runs");
    let _ = writeln!(notice, "\n{SHUTDOWN_NOTICE}");
    true
}

/// Subscribe to SIGINT/SIGTERM and spawn the listener task.
///
/// Subscription happens before this returns, so signals delivered afterwards are never missed.
/// The listener runs until the returned handle is aborted.
#[cfg(unix)]
pub fn spawn_cancellation_source(ctx: ExecutionContext) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => ShutdownSignal::Interrupt,
                Some(()) = terminate.recv() => ShutdownSignal::Terminate,
                else => break,
            };
            handle_signal(&ctx, received, &mut io::stderr());
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_cancellation_source(ctx: ExecutionContext) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            handle_signal(&ctx, ShutdownSignal::Interrupt, &mut io::stderr());
        }
    }))
}
