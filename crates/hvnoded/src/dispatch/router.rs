//! Command routing.
//!
//! Each [`Command`] maps onto one lifecycle or reconciliation call. The router
//! returns the terminal reply; progress replies are written directly through
//! the emitter while an import runs.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use hvnode_daemon_types::Response;
use hvnode_vswitch::{ManagementPlane, SwitchError, SwitchReconciler};

use crate::lifecycle::{ImportOptions, VmLifecycle};

use super::errors::DispatchError;
use super::guard::ImportGuard;
use super::request::{Command, CommandRequest, ImportArgs};
use super::response::ResponseEmitter;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Reconciler driving the daemon's management plane.
pub type DaemonReconciler = SwitchReconciler<Arc<dyn ManagementPlane>>;

/// Collaborators shared by every connection.
#[derive(Clone)]
pub struct DispatchServices {
    lifecycle: Arc<dyn VmLifecycle>,
    reconciler: Arc<DaemonReconciler>,
    import_guard: ImportGuard,
}

impl DispatchServices {
    /// Bundles the collaborators. Every clone shares the same import guard.
    pub fn new(
        lifecycle: Arc<dyn VmLifecycle>,
        reconciler: Arc<DaemonReconciler>,
        import_guard: ImportGuard,
    ) -> Self {
        Self {
            lifecycle,
            reconciler,
            import_guard,
        }
    }

    /// Switch reconciler.
    pub fn reconciler(&self) -> &DaemonReconciler {
        &self.reconciler
    }

    /// Import reentrancy guard.
    pub fn import_guard(&self) -> &ImportGuard {
        &self.import_guard
    }
}

/// Routes parsed requests to the collaborators.
pub(crate) struct CommandRouter {
    services: DispatchServices,
}

impl CommandRouter {
    pub(crate) fn new(services: DispatchServices) -> Self {
        Self { services }
    }

    /// Runs the request and returns its terminal reply.
    pub(crate) fn route<W: Write>(
        &self,
        request: &CommandRequest,
        emitter: &mut ResponseEmitter<W>,
    ) -> Result<Response, DispatchError> {
        let name = request.name();
        debug!(target: DISPATCH_TARGET, cmd = name, "routing command");
        match request.command() {
            Command::Version => Ok(Response::ok(
                name,
                Some(json!({ "version": env!("CARGO_PKG_VERSION") })),
            )),
            Command::Ping => Ok(Response::pong(name)),
            Command::StartVm => {
                self.services.lifecycle.start_vm()?;
                Ok(Response::ok(name, None))
            }
            Command::StopVm => {
                self.services.lifecycle.stop_vm()?;
                Ok(Response::ok(name, None))
            }
            Command::ImportVm(args) => self.import_vm(name, args, emitter),
            Command::GetKvp => Ok(Response::ok(name, Some(self.services.lifecycle.guest_kvp()))),
            Command::SwitchEnsure(args) => {
                self.services
                    .reconciler
                    .create_external_switch_if_missing(args.prefer_ethernet)?;
                Ok(Response::ok(name, None))
            }
            Command::SwitchRepair(args) => {
                self.services
                    .reconciler
                    .modify_switch_settings(args.prefer_ethernet)?;
                Ok(Response::ok(name, None))
            }
            Command::SwitchRemove => {
                self.services.reconciler.remove_switch()?;
                Ok(Response::ok(name, None))
            }
            Command::SwitchStatus => self.switch_status(name),
        }
    }

    fn import_vm<W: Write>(
        &self,
        name: &str,
        args: &ImportArgs,
        emitter: &mut ResponseEmitter<W>,
    ) -> Result<Response, DispatchError> {
        let Some(_permit) = self.services.import_guard.try_acquire() else {
            return Err(DispatchError::Busy);
        };

        let options = ImportOptions::for_keystore(args.keystore_dir.as_str());
        let report_progress = args.report_progress;
        let mut on_progress = |percent: u8| {
            if !report_progress {
                return;
            }
            if let Err(error) = emitter.progress(name, percent) {
                warn!(
                    target: DISPATCH_TARGET,
                    cmd = name,
                    percent,
                    %error,
                    "failed to write progress"
                );
            }
        };

        let lifecycle = &self.services.lifecycle;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            lifecycle.import_vm(&options, &mut on_progress)
        }));
        match outcome {
            Ok(result) => {
                result?;
                Ok(Response::ok(name, None))
            }
            Err(_) => Err(DispatchError::internal("virtual machine import panicked")),
        }
    }

    fn switch_status(&self, name: &str) -> Result<Response, DispatchError> {
        let reconciler = &self.services.reconciler;
        let switch = reconciler.get_switch(reconciler.switch_name())?;
        let path = switch
            .path()
            .map_err(|source| SwitchError::OperationFailed {
                operation: "switch-status",
                source,
            })?;
        Ok(Response::ok(
            name,
            Some(json!({ "name": switch.name(), "path": path })),
        ))
    }
}

#[cfg(test)]
mod tests;
