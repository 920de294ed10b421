use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use hvnode_config::{
    Config, SocketEndpoint, default_log_filter, default_log_format, default_socket_endpoint,
};

struct Harness {
    temp_dir: TempDir,
    config_lines: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<OsString>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            config_lines: RefCell::new(Vec::new()),
            cli_args: RefCell::new(vec![OsString::from("hvnoded")]),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
        }
    }

    fn add_config_line(&self, line: String) {
        self.config_lines.borrow_mut().push(line);
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn arguments(&self) -> Vec<OsString> {
        let mut args = self.cli_args.borrow().clone();
        let lines = self.config_lines.borrow();
        if lines.is_empty() {
            return args;
        }

        let path = self.temp_dir.path().join("hvnode.toml");
        if let Err(error) = fs::write(&path, lines.join("\n")) {
            panic!("failed to write configuration: {error}");
        }
        args.insert(1, path.into_os_string());
        args.insert(1, OsString::from("--config-path"));
        args
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        match Config::load_from_args(self.arguments()) {
            Ok(config) => {
                *self.loaded.borrow_mut() = Some(config);
            }
            Err(error) => {
                *self.error.borrow_mut() = Some(error.to_string());
            }
        }
    }

    fn loaded(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

fn parse_endpoint(value: &str) -> SocketEndpoint {
    match unquote(value).parse::<SocketEndpoint>() {
        Ok(endpoint) => endpoint,
        Err(error) => panic!("invalid socket '{value}': {error}"),
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the daemon socket to {socket}")]
fn given_configuration_socket(harness: &Harness, socket: String) {
    let endpoint = parse_endpoint(&socket);
    let line = match endpoint {
        SocketEndpoint::Unix { path } => {
            format!("daemon_socket = {{ transport = \"unix\", path = \"{path}\" }}")
        }
        SocketEndpoint::Tcp { host, port } => format!(
            "daemon_socket = {{ transport = \"tcp\", host = \"{host}\", port = {port} }}"
        ),
    };
    harness.add_config_line(line);
}

#[given("a configuration file naming the switch {name}")]
fn given_configuration_switch(harness: &Harness, name: String) {
    harness.add_config_line(format!("switch_name = \"{}\"", unquote(&name)));
}

#[when("the CLI sets the daemon socket to {socket}")]
fn when_cli_override(harness: &Harness, socket: String) {
    harness.push_cli_arg("--daemon-socket");
    harness.push_cli_arg(unquote(&socket));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the daemon socket to {socket}")]
fn then_resolved_socket(harness: &Harness, socket: String) {
    let config = harness.loaded();
    assert_eq!(config.daemon_socket(), &parse_endpoint(&socket));
}

#[then("loading the configuration resolves the switch name to {name}")]
fn then_resolved_switch(harness: &Harness, name: String) {
    let config = harness.loaded();
    assert_eq!(config.switch_name(), unquote(&name));
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded();
    assert_eq!(config.daemon_socket(), &default_socket_endpoint());
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert!(config.prefer_ethernet());
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_apply(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Configuration file overrides defaults"
)]
fn file_overrides_defaults(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command-line flags override the configuration file"
)]
fn cli_overrides_file(harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Configuration file sets the switch name"
)]
fn file_sets_switch_name(harness: Harness) {
    drop(harness);
}
