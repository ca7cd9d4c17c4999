//! Execution engine
//!
//! Runs the test command once per kernel version under a concurrency limit and collects the
//! results in input order.
//!
//! ## Modules
//!
//! - `context` - shared one-shot cancellation token
//! - `signals` - SIGINT/SIGTERM listener that cancels the context
//! - `runner` - `TaskRunner` trait and the launcher-backed implementation
//! - `scheduler` - admission control and result assembly

pub mod context;
pub mod runner;
pub mod scheduler;
pub mod signals;

pub use context::ExecutionContext;
pub use runner::{LauncherRunner, TaskRunner, TestCommand};
pub use scheduler::{ConcurrencyLimit, dispatch};
pub use signals::spawn_cancellation_source;
