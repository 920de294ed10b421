//! Routing behaviour against scripted collaborators.

use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use hvnode_config::DEFAULT_SWITCH_NAME;
use hvnode_vswitch::fake::FakePlane;

use super::*;
use crate::tests::support::{ScriptedLifecycle, services_with, wired_plane};

struct Harness {
    router: CommandRouter,
    services: DispatchServices,
    plane: Arc<FakePlane>,
    lifecycle: Arc<ScriptedLifecycle>,
}

impl Harness {
    fn new(plane: Arc<FakePlane>, lifecycle: ScriptedLifecycle) -> Self {
        let lifecycle = Arc::new(lifecycle);
        let services = services_with(Arc::clone(&plane), Arc::clone(&lifecycle));
        Self {
            router: CommandRouter::new(services.clone()),
            services,
            plane,
            lifecycle,
        }
    }

    fn wired() -> Self {
        Self::new(wired_plane(), ScriptedLifecycle::new())
    }

    /// Routes `line`, returning the terminal result and every progress line.
    fn route(&self, line: &str) -> (Result<Response, DispatchError>, Vec<Response>) {
        let request = CommandRequest::parse(line.as_bytes()).expect("request parses");
        let mut emitter = ResponseEmitter::new(Vec::new());
        let result = self.router.route(&request, &mut emitter);
        let written = String::from_utf8(emitter.into_inner()).expect("utf8 output");
        let progress = written
            .lines()
            .map(|line| serde_json::from_str(line).expect("progress reply"))
            .collect();
        (result, progress)
    }

    fn reply(&self, line: &str) -> Response {
        self.route(line).0.expect("command succeeds")
    }

    fn failure(&self, line: &str) -> DispatchError {
        self.route(line).0.expect_err("command fails")
    }
}

#[test]
fn version_reports_the_crate_version() {
    let harness = Harness::wired();
    assert_eq!(
        harness.reply(r#"{"cmd":"version"}"#),
        Response::ok("version", Some(json!({ "version": env!("CARGO_PKG_VERSION") })))
    );
}

#[test]
fn ping_answers_pong_with_the_normalised_name() {
    let harness = Harness::wired();
    assert_eq!(harness.reply(r#"{"cmd":"PING"}"#), Response::pong("ping"));
}

#[test]
fn start_and_stop_delegate_to_the_lifecycle() {
    let harness = Harness::wired();
    assert_eq!(harness.reply(r#"{"cmd":"start-vm"}"#), Response::ok("start-vm", None));
    assert_eq!(harness.reply(r#"{"cmd":"stop-vm"}"#), Response::ok("stop-vm", None));
    assert_eq!(harness.lifecycle.starts(), 1);
    assert_eq!(harness.lifecycle.stops(), 1);
}

#[test]
fn lifecycle_failures_surface_as_errors() {
    let harness = Harness::new(
        wired_plane(),
        ScriptedLifecycle::new().failing_start("vm is locked"),
    );
    let error = harness.failure(r#"{"cmd":"start-vm"}"#);
    assert!(matches!(error, DispatchError::Lifecycle(_)));
    assert_eq!(error.to_string(), "start-vm failed: vm is locked");
}

#[test]
fn get_kvp_returns_the_snapshot() {
    let harness = Harness::wired();
    let expected = harness.lifecycle.kvp().clone();
    assert_eq!(
        harness.reply(r#"{"cmd":"get-kvp"}"#),
        Response::ok("get-kvp", Some(expected))
    );
}

#[rstest]
#[case(true, vec![Response::progress("import-vm", 20), Response::progress("import-vm", 100)])]
#[case(false, Vec::new())]
fn import_streams_progress_only_on_request(
    #[case] report: bool,
    #[case] expected: Vec<Response>,
) {
    let harness = Harness::new(
        wired_plane(),
        ScriptedLifecycle::new().with_progress(&[20, 100]),
    );
    let line = format!(r#"{{"cmd":"import-vm","report-progress":{report}}}"#);
    let (result, progress) = harness.route(&line);
    assert_eq!(result.expect("import succeeds"), Response::ok("import-vm", None));
    assert_eq!(progress, expected);
}

#[test]
fn import_forwards_keystore_with_fixed_boot_options() {
    let harness = Harness::wired();
    harness.reply(r#"{"cmd":"import-vm","keystore-dir":"C:\\node\\keystore"}"#);
    assert_eq!(
        harness.lifecycle.imports(),
        [ImportOptions::for_keystore("C:\\node\\keystore")]
    );
}

#[test]
fn import_is_refused_while_another_holds_the_guard() {
    let harness = Harness::wired();
    let permit = harness.services.import_guard().try_acquire();
    assert!(permit.is_some());

    let error = harness.failure(r#"{"cmd":"import-vm"}"#);
    assert!(matches!(error, DispatchError::Busy));
    assert!(harness.lifecycle.imports().is_empty());

    drop(permit);
    harness.reply(r#"{"cmd":"import-vm"}"#);
    assert_eq!(harness.lifecycle.imports().len(), 1);
}

#[test]
fn panicking_import_releases_the_guard() {
    let harness = Harness::new(wired_plane(), ScriptedLifecycle::new().panicking_import());
    let error = harness.failure(r#"{"cmd":"import-vm"}"#);
    assert!(matches!(error, DispatchError::Internal { .. }));
    assert!(!harness.services.import_guard().is_busy());
}

#[test]
fn switch_ensure_then_status_describes_the_switch() {
    let harness = Harness::wired();
    assert_eq!(
        harness.reply(r#"{"cmd":"switch-ensure"}"#),
        Response::ok("switch-ensure", None)
    );
    assert_eq!(harness.plane.switch_names(), [DEFAULT_SWITCH_NAME]);

    let Response::Ok { data: Some(data), .. } = harness.reply(r#"{"cmd":"switch-status"}"#) else {
        panic!("status carries data");
    };
    assert_eq!(data["name"], DEFAULT_SWITCH_NAME);
    assert!(data["path"].as_str().is_some_and(|path| !path.is_empty()));
}

#[test]
fn status_of_a_missing_switch_is_an_error() {
    let harness = Harness::wired();
    let error = harness.failure(r#"{"cmd":"switch-status"}"#);
    assert!(matches!(error, DispatchError::Switch(ref inner) if inner.is_not_found()));
}

#[test]
fn removing_a_missing_switch_succeeds() {
    let harness = Harness::wired();
    assert_eq!(
        harness.reply(r#"{"cmd":"switch-remove"}"#),
        Response::ok("switch-remove", None)
    );
    assert!(harness.plane.calls().is_empty());
}

#[test]
fn repair_without_a_matching_adapter_fails_before_touching_ports() {
    let harness = Harness::wired();
    harness.reply(r#"{"cmd":"switch-ensure"}"#);

    let error = harness.failure(r#"{"cmd":"switch-repair","prefer-ethernet":false}"#);
    assert!(matches!(
        error,
        DispatchError::Switch(SwitchError::Unresolved {
            prefer_ethernet: false
        })
    ));
    assert_eq!(harness.plane.call_names(), ["DefineSystem"]);
}
