//! Configuration loaders for success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoError;
use tempfile::TempDir;

use hvnode_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that places the daemon socket under a temporary directory.
///
/// Non-Unix hosts get an ephemeral loopback TCP port instead.
pub struct TestConfigLoader {
    dir: TempDir,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temporary socket directory"),
        }
    }

    /// Configuration handed out by [`ConfigLoader::load`].
    pub fn config(&self) -> Config {
        Config {
            daemon_socket: self.endpoint(),
            job_poll_interval_ms: 1,
            job_timeout_secs: 2,
            ..Config::default()
        }
    }

    #[cfg(unix)]
    fn endpoint(&self) -> SocketEndpoint {
        let path = self.dir.path().join("run").join("hvnoded.sock");
        SocketEndpoint::unix(path.to_str().expect("socket path is UTF-8"))
    }

    #[cfg(not(unix))]
    fn endpoint(&self) -> SocketEndpoint {
        let _ = &self.dir;
        SocketEndpoint::tcp("127.0.0.1", 0)
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that fails by passing an unsupported socket scheme.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_args([
            OsString::from("hvnoded"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ])
    }
}
