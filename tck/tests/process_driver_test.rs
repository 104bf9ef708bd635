//! The real process driver against small shell scripts standing in for
//! the authoring tool.
#![cfg(unix)]
#![allow(clippy::await_holding_lock)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use hubs_tck::config::HarnessConfig;
use hubs_tck::driver::{
    InvocationBuilder, ProcessDriver, ToolRunner, OUTPUT_TAIL_LIMIT, USER_SCRIPTS_ENV,
};
use hubs_tck::HarnessError;

/// Writing a script while another test forks can make exec fail with
/// ETXTBSY; tests that write and run scripts take this lock.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn builder(user_scripts: &Path) -> InvocationBuilder {
    InvocationBuilder::from_config(&HarnessConfig::default()).with_user_scripts_dir(user_scripts)
}

#[tokio::test]
async fn test_failure_captures_stdout_only_by_default() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let tool = script(
        dir.path(),
        "blender",
        "echo 'Traceback (most recent call last): boom'\necho 'stderr noise' >&2\nexit 3",
    );
    let invocation = builder(dir.path()).export(&tool, None, &dir.path().join("out"), &[]);

    let err = assert_err!(ProcessDriver::new(Duration::from_secs(10)).execute(&invocation).await);
    match err {
        HarnessError::ToolInvocationFailed {
            reason,
            stdout,
            stderr,
        } => {
            assert_eq!(reason, "exit status 3");
            assert!(stdout.contains("Traceback"));
            assert!(stderr.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failure_captures_stderr_when_enabled() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let tool = script(dir.path(), "blender", "echo 'addon failed to register' >&2\nexit 1");
    let invocation = builder(dir.path()).export(&tool, None, &dir.path().join("out"), &[]);

    let driver = ProcessDriver::new(Duration::from_secs(10)).with_capture_stderr(true);
    let err = assert_err!(driver.execute(&invocation).await);
    assert!(err.to_string().contains("addon failed to register"));
}

#[tokio::test]
async fn test_failure_keeps_only_the_output_tail() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let tool = script(
        dir.path(),
        "blender",
        "head -c 300000 /dev/zero | tr '\\0' 'a'\necho 'Error: export aborted'\nexit 1",
    );
    let invocation = builder(dir.path()).export(&tool, None, &dir.path().join("out"), &[]);

    let err = assert_err!(ProcessDriver::new(Duration::from_secs(10)).execute(&invocation).await);
    match err {
        HarnessError::ToolInvocationFailed { stdout, .. } => {
            assert_eq!(stdout.len(), OUTPUT_TAIL_LIMIT);
            assert!(stdout.ends_with("Error: export aborted\n"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_timeout_kills_the_tool() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("finished");
    let tool = script(
        dir.path(),
        "blender",
        &format!("sleep 2\ntouch '{}'", marker.display()),
    );
    let invocation = builder(dir.path()).export(&tool, None, &dir.path().join("out"), &[]);

    let started = Instant::now();
    let err = assert_err!(
        ProcessDriver::new(Duration::from_millis(200))
            .execute(&invocation)
            .await
    );
    assert!(matches!(err, HarnessError::ToolInvocationTimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!marker.exists(), "killed tool must not finish its work");
}

#[tokio::test]
async fn test_output_dir_and_args_travel_through_argv() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let scripts = dir.path().join("scripts");
    std::fs::create_dir(&scripts).unwrap();
    let tool = script(
        dir.path(),
        "blender",
        &format!(
            "for a in \"$@\"; do echo \"$a\"; done > \"${env}/argv.txt\"\necho \"${env}\" > \"${env}/env.txt\"",
            env = USER_SCRIPTS_ENV
        ),
    );
    let out = dir.path().join("tests_out/export");
    let scene = dir.path().join("scenes/audio.blend");
    let invocation = builder(&scripts).export(&tool, Some(&scene), &out, &["--glb".to_string()]);

    assert_ok!(ProcessDriver::new(Duration::from_secs(10)).execute(&invocation).await);
    assert!(out.is_dir());

    let argv = std::fs::read_to_string(scripts.join("argv.txt")).unwrap();
    let argv: Vec<&str> = argv.lines().collect();
    let expected: Vec<String> = invocation
        .argv()
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(argv, expected);

    let split = argv.iter().position(|a| *a == "--").unwrap();
    assert_eq!(argv[split + 1], out.display().to_string());
    assert_eq!(argv[split + 2], "--glb");
    assert!(argv[..split].contains(&scene.display().to_string().as_str()));

    let env = std::fs::read_to_string(scripts.join("env.txt")).unwrap();
    assert_eq!(env.trim(), scripts.display().to_string());
}
