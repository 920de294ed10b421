//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use hvnode_config::{Config, SocketPreparationError};
use hvnode_vswitch::{JobPolicy, JobWaiter, ManagementPlane, SwitchError, SwitchReconciler};

use crate::dispatch::{DispatchServices, ImportGuard};
use crate::health::HealthReporter;
use crate::lifecycle::VmLifecycle;
use crate::placeholder_provider::{UnavailableLifecycle, UnavailablePlane};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that reads process arguments, environment and configuration files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_env()
    }
}

/// Loader that hands out an already resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Hypervisor-facing collaborators the daemon drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Virtualization management plane used for switch reconciliation.
    pub plane: Arc<dyn ManagementPlane>,
    /// Virtual machine lifecycle provider.
    pub lifecycle: Arc<dyn VmLifecycle>,
}

impl Collaborators {
    /// Providers that report every hypervisor operation as unavailable.
    pub(crate) fn unavailable() -> Self {
        Self {
            plane: Arc::new(UnavailablePlane),
            lifecycle: Arc::new(UnavailableLifecycle),
        }
    }
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    services: DispatchServices,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Services shared by every connection.
    #[must_use]
    pub fn services(&self) -> &DispatchServices {
        &self.services
    }

    /// Ensures the managed switch exists, reporting the outcome.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error after reporting it. Callers at
    /// startup log it and keep serving.
    pub fn reconcile_switch(&self) -> Result<(), SwitchError> {
        let reconciler = self.services.reconciler();
        let switch = reconciler.switch_name();
        self.reporter.reconciliation_starting(switch);
        match reconciler.create_external_switch_if_missing(self.config.prefer_ethernet()) {
            Ok(()) => {
                self.reporter.reconciliation_succeeded(switch);
                Ok(())
            }
            Err(error) => {
                self.reporter.reconciliation_failed(switch, &error);
                Err(error)
            }
        }
    }

    /// Consumes the daemon, yielding the services for the connection handler.
    #[must_use]
    pub fn into_services(self) -> DispatchServices {
        self.services
    }
}

/// Bootstraps the daemon using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    collaborators: Collaborators,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.daemon_socket().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let waiter = JobWaiter::new(JobPolicy::new(
        config.job_poll_interval(),
        config.job_timeout(),
    ));
    let reconciler = SwitchReconciler::new(collaborators.plane, config.switch_name(), waiter);
    let services = DispatchServices::new(
        collaborators.lifecycle,
        Arc::new(reconciler),
        ImportGuard::new(),
    );
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        services,
        telemetry,
        reporter,
    })
}
