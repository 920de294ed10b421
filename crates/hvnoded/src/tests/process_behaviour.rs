//! End-to-end tests for the daemon launch sequence over a Unix socket.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use serde_json::Value;

use hvnode_config::{Config, DEFAULT_SWITCH_NAME, RuntimePaths};
use hvnode_vswitch::fake::FakePlane;

use crate::bootstrap::StaticConfigLoader;
use crate::health::StructuredHealthReporter;
use crate::process::{LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, run_daemon_with};

use super::support::{ScriptedLifecycle, TestConfigLoader, collaborators, wired_plane};

const READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = cvar
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
        Ok(())
    }
}

/// A daemon running on a background thread.
struct RunningDaemon {
    // Owns the temporary directory holding the socket and runtime files.
    _loader: TestConfigLoader,
    config: Config,
    plane: Arc<FakePlane>,
    shutdown: TestShutdownSignal,
    thread: Option<JoinHandle<Result<(), LaunchError>>>,
}

impl RunningDaemon {
    fn launch(plane: Arc<FakePlane>) -> Self {
        let loader = TestConfigLoader::new();
        let config = loader.config();
        let shutdown = TestShutdownSignal::new();
        let plan = LaunchPlan {
            loader: StaticConfigLoader::new(config.clone()),
            reporter: Arc::new(StructuredHealthReporter::new()),
            shutdown: shutdown.clone(),
            collaborators: collaborators(Arc::clone(&plane), Arc::new(ScriptedLifecycle::new())),
        };
        let thread = thread::spawn(move || run_daemon_with(plan));
        let daemon = Self {
            _loader: loader,
            config,
            plane,
            shutdown,
            thread: Some(thread),
        };
        daemon.wait_for_status("ready");
        daemon
    }

    fn paths(&self) -> RuntimePaths {
        RuntimePaths::from_config(&self.config).expect("runtime paths")
    }

    fn socket_path(&self) -> PathBuf {
        self.config
            .daemon_socket()
            .unix_path()
            .expect("unix endpoint")
            .as_std_path()
            .to_path_buf()
    }

    fn wait_for_status(&self, status: &str) {
        let health_path = self.paths().health_path().to_path_buf();
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            let current = std::fs::read_to_string(&health_path)
                .ok()
                .and_then(|text| serde_json::from_str::<Value>(&text).ok())
                .and_then(|value| value["status"].as_str().map(str::to_owned));
            if current.as_deref() == Some(status) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "daemon never reported {status}, last status: {current:?}"
            );
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn request(&self, line: &str) -> Value {
        let mut stream = UnixStream::connect(self.socket_path()).expect("connect to daemon");
        stream
            .set_read_timeout(Some(READY_TIMEOUT))
            .expect("set read timeout");
        stream
            .write_all(format!("{line}\n").as_bytes())
            .expect("write request");
        let mut reply = String::new();
        BufReader::new(stream)
            .read_line(&mut reply)
            .expect("read reply");
        serde_json::from_str(reply.trim()).expect("reply is JSON")
    }

    fn stop(&mut self) -> Result<(), LaunchError> {
        self.shutdown.trigger();
        self.thread
            .take()
            .expect("daemon still running")
            .join()
            .expect("daemon thread panicked")
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.stop();
        }
    }
}

#[fixture]
fn daemon() -> RunningDaemon {
    RunningDaemon::launch(wired_plane())
}

#[rstest]
fn publishes_runtime_artefacts_while_ready(daemon: RunningDaemon) {
    let paths = daemon.paths();
    let pid = std::fs::read_to_string(paths.pid_path()).expect("pid file");
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert!(paths.lock_path().exists());

    let health: Value = serde_json::from_str(
        &std::fs::read_to_string(paths.health_path()).expect("health file"),
    )
    .expect("health is JSON");
    assert_eq!(health["status"], "ready");
    assert_eq!(health["pid"], std::process::id());
}

#[rstest]
fn reconciles_the_switch_before_serving(daemon: RunningDaemon) {
    assert_eq!(daemon.plane.switch_names(), [DEFAULT_SWITCH_NAME]);

    let reply = daemon.request(r#"{"cmd":"switch-status"}"#);
    assert_eq!(reply["status"], "ok");
    assert_eq!(reply["data"]["name"], DEFAULT_SWITCH_NAME);
}

#[rstest]
fn serves_commands_until_shutdown(mut daemon: RunningDaemon) {
    let reply = daemon.request(r#"{"cmd":"ping"}"#);
    assert_eq!(reply["status"], "pong");

    daemon.stop().expect("clean shutdown");

    let paths = daemon.paths();
    assert!(!paths.health_path().exists());
    assert!(!paths.pid_path().exists());
    assert!(!paths.lock_path().exists());
    assert!(!daemon.socket_path().exists());
}

#[rstest]
fn refuses_a_second_instance(daemon: RunningDaemon) {
    let plan = LaunchPlan {
        loader: StaticConfigLoader::new(daemon.config.clone()),
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: TestShutdownSignal::new(),
        collaborators: collaborators(wired_plane(), Arc::new(ScriptedLifecycle::new())),
    };

    let error = run_daemon_with(plan).expect_err("second instance must be refused");
    assert!(
        matches!(error, LaunchError::AlreadyRunning { pid } if pid == std::process::id()),
        "unexpected error: {error}"
    );
    assert_eq!(daemon.request(r#"{"cmd":"ping"}"#)["status"], "pong");
}

#[test]
fn starts_without_a_switch_when_no_adapter_qualifies() {
    let mut daemon = RunningDaemon::launch(Arc::new(FakePlane::new()));

    assert!(daemon.plane.switch_names().is_empty());
    let reply = daemon.request(r#"{"cmd":"switch-status"}"#);
    assert_eq!(reply["status"], "error");

    daemon.stop().expect("clean shutdown");
}
