use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        #[source]
        source: io::Error,
    },
}

/// Waits for SIGINT or SIGTERM.
///
/// Handlers only raise a flag; the waiting thread polls it at the configured
/// interval.
#[derive(Debug, Clone)]
pub struct SystemShutdownSignal {
    poll_interval: Duration,
}

impl SystemShutdownSignal {
    /// Builds a signal listener polling at `poll_interval`.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let requested = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            flag::register(signal, Arc::clone(&requested))
                .map_err(|source| ShutdownError::Install { source })?;
        }
        while !requested.load(Ordering::SeqCst) {
            thread::sleep(self.poll_interval);
        }
        info!(target: PROCESS_TARGET, "shutdown signal received");
        Ok(())
    }
}
