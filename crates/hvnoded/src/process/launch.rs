//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{debug, info};

use hvnode_config::RuntimePaths;

use crate::bootstrap::{
    Collaborators, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
use crate::dispatch::DispatchConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_POLL_INTERVAL};

/// Collaborators required to launch the daemon runtime.
pub struct LaunchPlan<L, S> {
    /// Configuration source.
    pub loader: L,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn HealthReporter>,
    /// Blocks until the daemon should stop.
    pub shutdown: S,
    /// Hypervisor-facing providers.
    pub collaborators: Collaborators,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when any launch step fails. Switch reconciliation
/// failures at startup are reported but do not stop the daemon.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::new(SHUTDOWN_POLL_INTERVAL),
        collaborators: Collaborators::unavailable(),
    })
}

/// Runs the daemon with injected collaborators.
///
/// # Errors
///
/// See [`run_daemon`].
pub fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
        collaborators,
    } = plan;

    let config = loader.load()?;
    config.daemon_socket().prepare_filesystem()?;
    let runtime_paths = RuntimePaths::from_config(&config)?;
    let mut guard = ProcessGuard::acquire(runtime_paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;
    let listener = SocketListener::bind(config.daemon_socket())?;

    let static_loader = StaticConfigLoader::new(config);
    let daemon = bootstrap_with(&static_loader, reporter, collaborators)?;
    info!(
        target: PROCESS_TARGET,
        endpoint = %daemon.config().daemon_socket(),
        "starting daemon runtime"
    );
    if let Err(error) = daemon.reconcile_switch() {
        debug!(
            target: PROCESS_TARGET,
            %error,
            "continuing without a reconciled switch"
        );
    }

    let handler = Arc::new(DispatchConnectionHandler::new(daemon.into_services()));
    let listener_handle = listener.start(handler)?;
    guard.write_health(HealthState::Ready)?;
    shutdown.wait()?;
    guard.write_health(HealthState::Stopping)?;
    listener_handle.shutdown();
    listener_handle.join()?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
