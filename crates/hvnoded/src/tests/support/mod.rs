//! Shared fixtures for the daemon test suites.

mod config_loader;
mod lifecycle;

use std::sync::Arc;
use std::time::Duration;

use hvnode_config::DEFAULT_SWITCH_NAME;
use hvnode_vswitch::fake::FakePlane;
use hvnode_vswitch::{JobPolicy, JobWaiter, ManagementPlane, SwitchReconciler};

use crate::bootstrap::Collaborators;
use crate::dispatch::{DispatchServices, ImportGuard};

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use lifecycle::{GateHandle, ScriptedLifecycle};

/// Management-plane job policy fast enough for tests.
pub fn fast_waiter() -> JobWaiter {
    JobWaiter::new(JobPolicy::new(
        Duration::from_millis(1),
        Duration::from_secs(2),
    ))
}

/// Plane with one ethernet adapter exposing a switchable port.
pub fn wired_plane() -> Arc<FakePlane> {
    let plane = FakePlane::new();
    plane.add_adapter("{6F1B}", "Intel(R) Ethernet I219-V", "e1dexpress", 0);
    plane.add_external_port("{6F1B}", "00155D0A0B0C");
    Arc::new(plane)
}

/// Services over the given plane and lifecycle, named after the default switch.
pub fn services_with(plane: Arc<FakePlane>, lifecycle: Arc<ScriptedLifecycle>) -> DispatchServices {
    let plane: Arc<dyn ManagementPlane> = plane;
    let reconciler = SwitchReconciler::new(plane, DEFAULT_SWITCH_NAME, fast_waiter());
    DispatchServices::new(lifecycle, Arc::new(reconciler), ImportGuard::new())
}

/// Services over a wired plane.
pub fn dispatch_services(lifecycle: ScriptedLifecycle) -> DispatchServices {
    services_with(wired_plane(), Arc::new(lifecycle))
}

/// Bootstrap collaborators over the given plane and lifecycle.
pub fn collaborators(plane: Arc<FakePlane>, lifecycle: Arc<ScriptedLifecycle>) -> Collaborators {
    Collaborators { plane, lifecycle }
}
