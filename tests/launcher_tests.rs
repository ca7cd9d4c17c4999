//! End-to-end launcher runs against a fake `vng` shell script.
//!
//! The script accepts `-r VERSION -- CMD...`, mimics the launcher's missing-kernel error wording for
//! a couple of known-bad versions, and otherwise execs the test command.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use kmatrix::{
    ConcurrencyLimit, ExecutionContext, KernelVersion, LauncherRunner, Outcome, TaskRunner, TestCommand, dispatch,
};

const WRONG_NAME: &str = "wrong-name";
const WRONG_VERSION: &str = "v5.37.1";
const VALID_VERSION: &str = "v5.4.293";

const FAKE_LAUNCHER: &str = r#"#!/bin/sh
[ "$1" = "-r" ] || { echo "usage: $0 -r VERSION -- CMD" >&2; exit 2; }
version="$2"
[ "$3" = "--" ] || { echo "expected -- after the version" >&2; exit 2; }
shift 3
case "$version" in
  wrong-name) echo "kernel $version does not exist" >&2; exit 1 ;;
  v5.37.1) echo "failed to retrieve content from the kernel mirror" >&2; exit 1 ;;
esac
exec "$@"
"#;

/// Launcher that forks a long-running guest process and waits for it, like `vng` with qemu.
const FORKING_LAUNCHER: &str = r#"#!/bin/sh
echo 'booting guest kernel' >&2
sleep 47 &
echo $! > "$(dirname "$0")/forking.pid"
wait
"#;

/// Launcher that exits right away but leaves a child holding its output pipes.
const DETACHING_LAUNCHER: &str = r#"#!/bin/sh
sleep 13 &
echo $! > "$(dirname "$0")/detaching.pid"
exit 0
"#;

struct FakeLaunchers {
    dir: PathBuf,
    vng: PathBuf,
    forking: PathBuf,
    detaching: PathBuf,
}

/// Write every fake launcher once per test binary, before any of them is spawned.
fn fake_launchers() -> &'static FakeLaunchers {
    static LAUNCHERS: OnceLock<FakeLaunchers> = OnceLock::new();
    LAUNCHERS.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("kmatrix_fake_vng_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        };
        FakeLaunchers {
            vng: write("vng", FAKE_LAUNCHER),
            forking: write("vng-forking", FORKING_LAUNCHER),
            detaching: write("vng-detaching", DETACHING_LAUNCHER),
            dir: dir.clone(),
        }
    })
}

fn fake_launcher() -> &'static Path {
    &fake_launchers().vng
}

fn runner(command: &str) -> LauncherRunner {
    LauncherRunner::new(fake_launcher(), TestCommand::parse(command).unwrap())
}

async fn run_one(command: &str, version: &str) -> kmatrix::TaskResult {
    runner(command)
        .run(&ExecutionContext::new(), &KernelVersion::from(version))
        .await
}

#[tokio::test]
async fn wrong_machine_name_is_missing() {
    let result = run_one("true", WRONG_NAME).await;
    assert_eq!(result.outcome, Outcome::Missing);
    assert!(result.message.contains("does not exist"));
}

#[tokio::test]
async fn wrong_machine_version_is_missing() {
    let result = run_one("true", WRONG_VERSION).await;
    assert_eq!(result.outcome, Outcome::Missing);
    assert!(result.message.contains("failed to retrieve content"));
}

#[tokio::test]
async fn succeeding_command_reports_stdout() {
    let result = run_one("echo hello from the guest", VALID_VERSION).await;
    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.message, "hello from the guest\n");
}

#[tokio::test]
async fn failing_command_reports_stderr() {
    let result = run_one("ls /nonexistent-kmatrix-path", VALID_VERSION).await;
    assert_eq!(result.outcome, Outcome::Failure);
    assert!(!result.message.is_empty(), "stderr should be captured");
    assert!(result.message.contains("/nonexistent-kmatrix-path"));
}

#[tokio::test]
async fn stdout_and_stderr_are_kept_apart() {
    // `ls` prints the existing path to stdout and complains about the missing one on stderr.
    let result = run_one("ls / /nonexistent-kmatrix-path", VALID_VERSION).await;
    assert_eq!(result.outcome, Outcome::Failure);
    assert!(result.message.contains("/nonexistent-kmatrix-path"));
    assert!(!result.message.contains("bin\n"), "stdout must not leak into the failure message");
}

#[tokio::test]
async fn extra_signature_turns_failure_into_missing() {
    let classifier = kmatrix_core::OutcomeClassifier::new().with_extra_signatures(["nonexistent-kmatrix-path"]);
    let result = runner("ls /nonexistent-kmatrix-path")
        .with_classifier(classifier)
        .run(&ExecutionContext::new(), &KernelVersion::from(VALID_VERSION))
        .await;
    assert_eq!(result.outcome, Outcome::Missing);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_kills_running_launcher() {
    let ctx = ExecutionContext::new();
    let runner = runner("sleep 30");

    let start = Instant::now();
    let canceller = cancel_after(&ctx, Duration::from_millis(200));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        runner.run(&ctx, &KernelVersion::from(VALID_VERSION)),
    )
    .await
    .expect("a cancelled launcher must be killed, not waited for");
    canceller.await.unwrap();

    assert_eq!(result.outcome, Outcome::Failure);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn matrix_run_mixes_outcomes_in_order() {
    let versions: Vec<KernelVersion> = [VALID_VERSION, WRONG_NAME, "v6.1", WRONG_VERSION]
        .into_iter()
        .map(KernelVersion::from)
        .collect();

    let results = dispatch(
        &versions,
        ConcurrencyLimit::new(2).unwrap(),
        &ExecutionContext::new(),
        Arc::new(runner("echo ok")),
    )
    .await;

    let outcomes: Vec<(&str, Outcome)> = results.iter().map(|r| (r.version.as_str(), r.outcome)).collect();
    assert_eq!(
        outcomes,
        [
            (VALID_VERSION, Outcome::Success),
            (WRONG_NAME, Outcome::Missing),
            ("v6.1", Outcome::Success),
            (WRONG_VERSION, Outcome::Missing),
        ]
    );
}

#[tokio::test]
async fn serial_matrix_preserves_order() {
    let versions: Vec<KernelVersion> = ["a", "b", "c"].into_iter().map(KernelVersion::from).collect();
    let results = dispatch(
        &versions,
        ConcurrencyLimit::SERIAL,
        &ExecutionContext::new(),
        Arc::new(runner("true")),
    )
    .await;

    let order: Vec<&str> = results.iter().map(|r| r.version.as_str()).collect();
    assert_eq!(order, ["a", "b", "c"]);
    assert!(results.iter().all(|r| r.outcome == Outcome::Success));
}

/// Cancel `ctx` after `delay`.
fn cancel_after(ctx: &ExecutionContext, delay: Duration) -> tokio::task::JoinHandle<()> {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        ctx.cancel();
    })
}

/// Whether `pid` is a live (non-zombie) process.
#[cfg(target_os = "linux")]
fn is_alive(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        // The state follows the parenthesized command name.
        Ok(stat) => !matches!(
            stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next()),
            Some("Z" | "X") | None
        ),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
async fn wait_until_dead(pid: &str) -> bool {
    for _ in 0..100 {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_kills_forked_guest_and_keeps_stderr() {
    let launchers = fake_launchers();
    let runner = LauncherRunner::new(&launchers.forking, TestCommand::parse("true").unwrap());
    let ctx = ExecutionContext::new();
    let canceller = cancel_after(&ctx, Duration::from_millis(300));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(&ctx, &KernelVersion::from(VALID_VERSION)),
    )
    .await
    .expect("a cancelled launcher with a forked guest must finish promptly");
    canceller.await.unwrap();

    assert_eq!(result.outcome, Outcome::Failure);
    assert!(
        result.message.contains("booting guest kernel"),
        "stderr read before the kill must be kept, got {:?}",
        result.message
    );
    let pid = fs::read_to_string(launchers.dir.join("forking.pid")).unwrap();
    assert!(wait_until_dead(pid.trim()).await, "forked guest {} outlived the run", pid.trim());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_stops_collecting_from_leftover_children() {
    let launchers = fake_launchers();
    let runner = LauncherRunner::new(&launchers.detaching, TestCommand::parse("true").unwrap());
    let ctx = ExecutionContext::new();
    let canceller = cancel_after(&ctx, Duration::from_millis(300));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(&ctx, &KernelVersion::from(VALID_VERSION)),
    )
    .await
    .expect("output collection must stop once the run is cancelled");
    canceller.await.unwrap();

    // The launcher itself exited zero before the cancellation.
    assert_eq!(result.outcome, Outcome::Success);
    let pid = fs::read_to_string(launchers.dir.join("detaching.pid")).unwrap();
    assert!(wait_until_dead(pid.trim()).await, "leftover child {} outlived the run", pid.trim());
}

/// Runs against a real virtme-ng installation.
#[tokio::test]
#[ignore = "requires virtme-ng (`vng`) on PATH"]
async fn real_vng_wrong_name_is_missing() {
    let runner = LauncherRunner::new("vng", TestCommand::parse("/usr/bin/true").unwrap());
    let result = runner
        .run(&ExecutionContext::new(), &KernelVersion::from(WRONG_NAME))
        .await;
    assert_eq!(result.outcome, Outcome::Missing, "unexpected launcher output: {}", result.message);
}
