//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use hvnode_config::Config;
use hvnode_vswitch::SwitchError;

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
#[cfg_attr(test, mockall::automock)]
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the startup switch reconciliation runs.
    fn reconciliation_starting(&self, switch: &str);

    /// Invoked when the managed switch is present after startup reconciliation.
    fn reconciliation_succeeded(&self, switch: &str);

    /// Invoked when startup reconciliation fails. The daemon keeps serving.
    fn reconciliation_failed(&self, switch: &str, error: &SwitchError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn reconciliation_starting(&self, switch: &str) {
        (**self).reconciliation_starting(switch);
    }

    fn reconciliation_succeeded(&self, switch: &str) {
        (**self).reconciliation_succeeded(switch);
    }

    fn reconciliation_failed(&self, switch: &str, error: &SwitchError) {
        (**self).reconciliation_failed(switch, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            switch = %config.switch_name(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn reconciliation_starting(&self, switch: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "reconciliation_starting",
            switch,
            "ensuring virtual switch"
        );
    }

    fn reconciliation_succeeded(&self, switch: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "reconciliation_succeeded",
            switch,
            "virtual switch present"
        );
    }

    fn reconciliation_failed(&self, switch: &str, error: &SwitchError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "reconciliation_failed",
            switch,
            error = %error,
            "virtual switch reconciliation failed; serving commands anyway"
        );
    }
}
