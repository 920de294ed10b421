//! Shared configuration for the `hvnoded` daemon.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! TOML file (`--config-path` or `HVNODE_CONFIG_PATH`), then `HVNODE_*`
//! environment variables, then command-line flags.

mod defaults;
mod logging;
mod runtime;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_JOB_POLL_INTERVAL_MS, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_LOG_FILTER,
    DEFAULT_SWITCH_NAME, DEFAULT_TCP_PORT, default_job_poll_interval_ms,
    default_job_timeout_secs, default_log_filter, default_log_filter_string, default_log_format,
    default_prefer_ethernet, default_socket_endpoint, default_switch_name,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "HVNODE")]
pub struct Config {
    /// Endpoint the parent process connects to.
    #[serde(default = "default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Logical name of the managed virtual switch.
    #[serde(default = "default_switch_name")]
    pub switch_name: String,
    /// Bind the switch to an ethernet adapter (`true`) or a non-ethernet one.
    ///
    /// Takes an explicit value (`--prefer-ethernet false`); unset means
    /// [`default_prefer_ethernet`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_ethernet: Option<bool>,
    /// Delay between job state polls, in milliseconds.
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,
    /// Maximum time to await a single job, in seconds.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            switch_name: default_switch_name(),
            prefer_ethernet: None,
            job_poll_interval_ms: default_job_poll_interval_ms(),
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments, environment and files.
    pub fn load_from_env() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is the program name, as with `std::env::args_os`.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the daemon listens on.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Logical switch name.
    #[must_use]
    pub fn switch_name(&self) -> &str {
        self.switch_name.as_str()
    }

    /// Adapter medium preference used for startup reconciliation.
    #[must_use]
    pub fn prefer_ethernet(&self) -> bool {
        self.prefer_ethernet.unwrap_or_else(default_prefer_ethernet)
    }

    /// Delay between job polls. Never zero.
    #[must_use]
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms.max(1))
    }

    /// Maximum time to await a single job.
    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_the_bridge_switch() {
        let config = Config::default();
        assert_eq!(config.switch_name(), "Myst Bridge Switch");
        assert!(config.prefer_ethernet());
        assert_eq!(config.job_poll_interval(), Duration::from_millis(500));
        assert_eq!(config.job_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn explicit_preference_replaces_the_default() {
        let config = Config {
            prefer_ethernet: Some(false),
            ..Config::default()
        };
        assert!(!config.prefer_ethernet());
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = Config {
            job_poll_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.job_poll_interval(), Duration::from_millis(1));
    }
}
