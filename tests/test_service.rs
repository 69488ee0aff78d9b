// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the daemon lifecycle: start, liveness, stop, hooks.
// These fork real processes, so they run one at a time.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

use serial_test::serial;
use tempfile::TempDir;

use svcd::{ManagedService, Paths, ProcessError, ServiceConfig};

fn setup(name: &str, body: &str) -> (TempDir, Paths, ManagedService) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::with_root(dir.path());
    paths.ensure_dirs().unwrap();
    fs::create_dir_all(&paths.service_dir).unwrap();
    fs::write(paths.config_path(name), body).unwrap();
    let svc = ManagedService::load(&paths, name).unwrap();
    (dir, paths, svc)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

// ===========================================================================
// start / stop
// ===========================================================================

#[test]
#[serial]
fn start_publishes_pid_and_stop_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("sleeper.log");
    let marker = dir.path().join("stopped.marker");
    let (_root, _paths, mut svc) = setup(
        "sleeper",
        &format!(
            "exec sleep 30\nlog {}\nonstop exec touch {}\n",
            log.display(),
            marker.display()
        ),
    );

    svc.start().expect("start");
    assert!(svc.pid > 0);
    assert!(svc.is_running());
    assert_eq!(read(&svc.cfg.pidfile).trim(), svc.pid.to_string());
    assert!(wait_until(Duration::from_secs(2), || read(&log)
        .starts_with("service: started.\n")));

    svc.stop().expect("stop");
    assert_eq!(svc.pid, -1);
    assert!(!svc.is_running());
    assert!(!svc.cfg.pidfile.exists());
    assert!(read(&log).ends_with("service: stopped.\n"));
    assert!(marker.exists());
}

#[test]
#[serial]
fn second_start_is_refused() {
    let (_root, _paths, mut svc) = setup("twice", "exec sleep 30\n");
    svc.start().expect("start");
    assert!(matches!(svc.start(), Err(ProcessError::AlreadyRunning)));
    svc.stop().expect("stop");
    assert!(matches!(svc.stop(), Err(ProcessError::NotRunning)));
}

#[test]
#[serial]
fn invalid_config_is_refused() {
    let mut svc = ManagedService::new(ServiceConfig::default());
    assert!(matches!(svc.start(), Err(ProcessError::InvalidConfig)));
}

#[test]
#[serial]
fn stale_pid_file_is_replaced() {
    let (_root, _paths, mut svc) = setup("stale", "exec sleep 30\n");
    fs::write(&svc.cfg.pidfile, "999999\n").unwrap();
    svc.start().expect("start");
    assert_ne!(svc.pid, 999_999);
    svc.stop().expect("stop");
}

#[test]
#[serial]
fn exited_service_is_not_running() {
    let (_root, _paths, mut svc) = setup("quick", "exec exit 3\n");
    svc.start().expect("pid is published before exec");
    assert!(wait_until(Duration::from_secs(3), || !svc.is_running()));
}

#[test]
#[serial]
fn term_ignoring_service_is_killed() {
    let (_root, _paths, mut svc) = setup("stubborn", "exec trap '' TERM; exec sleep 30\n");
    svc.start().expect("start");
    let t0 = Instant::now();
    svc.stop().expect("stop");
    assert!(t0.elapsed() >= svcd::service::STOP_TIMEOUT);
    assert!(!svc.is_running());
}

// ===========================================================================
// Logs, scripts, environment
// ===========================================================================

#[test]
#[serial]
fn wipe_log_truncates_on_start() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("wiped.log");
    fs::write(&log, "old junk\n").unwrap();
    let (_root, _paths, mut svc) = setup(
        "wiped",
        &format!("exec sleep 30\nlog {}\nwipe log\n", log.display()),
    );
    svc.start().expect("start");
    assert!(wait_until(Duration::from_secs(2), || read(&log)
        .starts_with("service: started.\n")));
    assert!(!read(&log).contains("old junk"));
    svc.stop().expect("stop");
}

#[test]
#[serial]
fn script_service_runs_generated_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("script.log");
    let (_root, paths, mut svc) = setup(
        "scripted",
        &format!(
            "log {}\nscript\necho from-script\nexec sleep 30\nend script\n",
            log.display()
        ),
    );
    svc.start().expect("start");

    let script = paths.script_path("scripted");
    assert!(read(&script).starts_with("#!/bin/sh\n"));
    let mode = fs::metadata(&script).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    assert!(wait_until(Duration::from_secs(3), || read(&log).contains("from-script")));
    svc.stop().expect("stop");
}

#[test]
#[serial]
fn supervisor_log_filter_is_not_inherited() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("env.log");
    std::env::set_var(svcd::service::LOG_ENV, "trace");
    let (_root, _paths, mut svc) = setup(
        "env",
        &format!(
            "exec echo \"filter=${{SVCD_LOG:-unset}}\"; exec sleep 30\nlog {}\n",
            log.display()
        ),
    );
    svc.start().expect("start");
    std::env::remove_var(svcd::service::LOG_ENV);

    assert!(wait_until(Duration::from_secs(3), || read(&log).contains("filter=")));
    assert!(read(&log).contains("filter=unset"));
    svc.stop().expect("stop");
}
