//! Host-side daemon for a Hyper-V node.
//!
//! `hvnoded` keeps the host's external virtual switch in shape and lets a
//! parent process drive the node's virtual machine over a newline-delimited
//! JSON command channel.
//!
//! The launch sequence:
//!
//! 1. loads configuration through [`hvnode_config`] and claims the runtime
//!    directory (lock, pid file, health snapshot);
//! 2. binds the command socket, installs structured telemetry and builds the
//!    shared dispatch services;
//! 3. ensures the managed switch exists once. A failure here is reported and
//!    logged but the daemon still serves commands, so the parent can issue
//!    `switch-repair`;
//! 4. serves connections until SIGINT or SIGTERM.
//!
//! Hypervisor access goes through two seams: [`hvnode_vswitch::ManagementPlane`]
//! for switch reconciliation and [`VmLifecycle`] for the virtual machine
//! itself. See the [`dispatch`] module for the wire protocol.

mod bootstrap;
pub mod dispatch;
mod health;
mod lifecycle;
mod placeholder_provider;
mod process;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Collaborators, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{ImportOptions, LifecycleError, VmLifecycle};
pub use process::{
    LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
    run_daemon_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
