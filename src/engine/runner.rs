//! Task runner: one launcher invocation per kernel version.
//!
//! ## Invocation shape
//!
//! ```text
//! <launcher> -r <version> -- <program> <args...>
//! ```
//!
//! stdout and stderr are captured into separate buffers for the lifetime of the process. If the
//! run's [`ExecutionContext`] is cancelled while the launcher is running, the process is killed
//! immediately (SIGKILL, no grace period) and the invocation counts as a non-zero exit.
//!
//! On unix the launcher leads its own process group and the kill goes to the whole group, so guest
//! processes it forked die with it. Output read before the kill is kept.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kmatrix_core::{KernelVersion, Outcome, OutcomeClassifier, TaskResult};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use super::context::ExecutionContext;

/// Launcher flag selecting the kernel version to boot.
pub const KERNEL_VERSION_FLAG: &str = "-r";

/// Separator between launcher options and the guest command.
pub const COMMAND_SEPARATOR: &str = "--";

/// Executes the work for one kernel version.
///
/// The scheduler only depends on this trait, so tests can substitute runners that never spawn a
/// process.
pub trait TaskRunner: Send + Sync {
    /// Run one task. Must always produce a result; failures are reported as outcomes.
    fn run(&self, ctx: &ExecutionContext, version: &KernelVersion) -> impl Future<Output = TaskResult> + Send;
}

/// Test command split into program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TestCommand {
    /// Split a command line on whitespace. Returns `None` if there is no program token.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Runs the test command inside a guest kernel via the external launcher.
#[derive(Debug, Clone)]
pub struct LauncherRunner {
    launcher: PathBuf,
    command: TestCommand,
    classifier: OutcomeClassifier,
}

impl LauncherRunner {
    pub fn new(launcher: impl Into<PathBuf>, command: TestCommand) -> Self {
        Self {
            launcher: launcher.into(),
            command,
            classifier: OutcomeClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: OutcomeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    /// Arguments passed to the launcher for `version`.
    pub fn launcher_args(&self, version: &KernelVersion) -> Vec<String> {
        let mut args = Vec::with_capacity(4 + self.command.args.len());
        args.push(KERNEL_VERSION_FLAG.to_string());
        args.push(version.as_str().to_string());
        args.push(COMMAND_SEPARATOR.to_string());
        args.push(self.command.program.clone());
        args.extend(self.command.args.iter().cloned());
        args
    }

    async fn invoke(&self, ctx: &ExecutionContext, version: &KernelVersion) -> io::Result<Captured> {
        let mut command = Command::new(&self.launcher);
        command
            .args(self.launcher_args(version))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a kill also reaches whatever the launcher forked (qemu).
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let group = ProcessGroup::of(&child);
        let mut stdout = PipeCapture::spawn(child.stdout.take());
        let mut stderr = PipeCapture::spawn(child.stderr.take());

        let exit = wait_or_kill(&mut child, group, ctx, version).await?;
        if exit != Exit::Killed {
            // The launcher is gone, but processes it left behind may still hold the pipes open.
            let closed = tokio::select! {
                () = async {
                    stdout.closed().await;
                    stderr.closed().await;
                } => true,
                () = ctx.cancelled() => false,
            };
            if !closed {
                debug!(%version, "run cancelled while collecting output, killing process group");
                group.kill();
            }
        }

        Ok(Captured {
            succeeded: exit == Exit::Finished(true),
            stdout: stdout.drain().await,
            stderr: stderr.drain().await,
        })
    }
}

impl TaskRunner for LauncherRunner {
    async fn run(&self, ctx: &ExecutionContext, version: &KernelVersion) -> TaskResult {
        debug!(
            launcher = %self.launcher.display(),
            args = ?self.launcher_args(version),
            "running launcher"
        );

        let result = match self.invoke(ctx, version).await {
            Ok(captured) => {
                let (outcome, message) = self
                    .classifier
                    .classify(captured.succeeded, captured.stdout, captured.stderr);
                TaskResult::new(version.clone(), outcome, message)
            }
            Err(e) => TaskResult::new(
                version.clone(),
                Outcome::Failure,
                format!("failed to run '{}': {}", self.launcher.display(), e),
            ),
        };

        debug!(%version, outcome = result.outcome.as_str(), "launcher complete");
        result
    }
}

/// How long to keep reading output after a kill.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Process exited on its own; `true` for status zero.
    Finished(bool),
    Killed,
}

/// Captured output of one invocation.
struct Captured {
    succeeded: bool,
    stdout: String,
    stderr: String,
}

/// Process group led by the launcher (its pid doubles as the group id).
#[derive(Debug, Clone, Copy)]
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self(child.id())
    }

    /// SIGKILL every process in the group. Returns `false` if no signal was delivered.
    #[cfg(unix)]
    fn kill(self) -> bool {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pgid) = self.0.and_then(|pid| i32::try_from(pid).ok()) else {
            return false;
        };
        killpg(Pid::from_raw(pgid), Signal::SIGKILL).is_ok()
    }

    #[cfg(not(unix))]
    fn kill(self) -> bool {
        false
    }
}

async fn wait_or_kill(
    child: &mut Child,
    group: ProcessGroup,
    ctx: &ExecutionContext,
    version: &KernelVersion,
) -> io::Result<Exit> {
    tokio::select! {
        status = child.wait() => Ok(Exit::Finished(status?.success())),
        () = ctx.cancelled() => {
            debug!(%version, "run cancelled, killing launcher process group");
            if !group.kill() {
                child.start_kill()?;
            }
            child.wait().await?;
            Ok(Exit::Killed)
        }
    }
}

/// Output of one pipe, accumulated as it arrives.
///
/// The buffer outlives the reader task, so output read before a drain timeout is kept.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl PipeCapture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let reader = tokio::spawn(read_into(pipe, Arc::clone(&buf)));
        Self {
            buf,
            reader: Some(reader),
        }
    }

    /// Wait for end of file on the pipe. Cancel-safe.
    async fn closed(&mut self) {
        if let Some(reader) = &mut self.reader {
            let _ = reader.await;
            self.reader = None;
        }
    }

    /// Wait up to [`DRAIN_TIMEOUT`] for end of file, then return everything read so far.
    async fn drain(mut self) -> String {
        if tokio::time::timeout(DRAIN_TIMEOUT, self.closed()).await.is_err() {
            if let Some(reader) = self.reader.take() {
                reader.abort();
            }
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

async fn read_into<R: AsyncRead + Unpin>(pipe: Option<R>, buf: Arc<Mutex<Vec<u8>>>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                let mut buf = buf.lock().unwrap_or_else(PoisonError::into_inner);
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}
