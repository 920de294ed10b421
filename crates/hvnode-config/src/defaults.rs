#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::SocketEndpoint;

/// Default TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9779;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Logical name of the managed virtual switch.
pub const DEFAULT_SWITCH_NAME: &str = "Myst Bridge Switch";

/// Interval between job state polls.
pub const DEFAULT_JOB_POLL_INTERVAL_MS: u64 = 500;

/// Upper bound on how long a single management-plane job may be awaited.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Owned default switch name.
#[must_use]
pub fn default_switch_name() -> String {
    DEFAULT_SWITCH_NAME.to_owned()
}

/// Ethernet adapters are preferred unless configured otherwise.
#[must_use]
pub const fn default_prefer_ethernet() -> bool {
    true
}

/// Default job poll interval in milliseconds.
#[must_use]
pub const fn default_job_poll_interval_ms() -> u64 {
    DEFAULT_JOB_POLL_INTERVAL_MS
}

/// Default job timeout in seconds.
#[must_use]
pub const fn default_job_timeout_secs() -> u64 {
    DEFAULT_JOB_TIMEOUT_SECS
}

/// Computes the default socket endpoint for the daemon.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("hvnode");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("hvnoded.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
