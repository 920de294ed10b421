//! Virtual machine lifecycle contract.
//!
//! Starting, stopping and importing the node's virtual machine, and reading
//! its guest key-value pairs, live behind [`VmLifecycle`]. The dispatcher only
//! sequences these calls and reports their outcome.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Parameters for a virtual machine import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace an existing machine of the same name.
    pub force: bool,
    /// Interval between guest boot checks.
    pub boot_poll_interval: Duration,
    /// Maximum time to wait for the guest to boot.
    pub boot_timeout: Duration,
    /// Directory holding the node keystore to inject, empty for none.
    pub keystore_dir: String,
}

impl ImportOptions {
    /// Options used for imports requested over the command channel.
    #[must_use]
    pub fn for_keystore(keystore_dir: impl Into<String>) -> Self {
        Self {
            keystore_dir: keystore_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            force: true,
            boot_poll_interval: Duration::from_secs(5),
            boot_timeout: Duration::from_secs(5 * 60),
            keystore_dir: String::new(),
        }
    }
}

/// Failure of a lifecycle operation.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No lifecycle provider is available on this host.
    #[error("virtual machine lifecycle is unavailable: {reason}")]
    Unavailable { reason: String },
    /// The operation ran and failed.
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },
}

impl LifecycleError {
    /// Creates an operation failure.
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }
}

/// Operations on the node's virtual machine.
pub trait VmLifecycle: Send + Sync {
    /// Starts the virtual machine.
    fn start_vm(&self) -> Result<(), LifecycleError>;

    /// Stops the virtual machine.
    fn stop_vm(&self) -> Result<(), LifecycleError>;

    /// Imports the virtual machine, reporting completion percentages in order.
    fn import_vm(
        &self,
        options: &ImportOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(), LifecycleError>;

    /// Last guest key-value snapshot. Never refreshes.
    fn guest_kvp(&self) -> Value;
}
