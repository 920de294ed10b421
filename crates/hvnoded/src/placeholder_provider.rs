//! Placeholder collaborators used when no hypervisor integration is linked in.
//!
//! They let the daemon start, serve `ping`/`version` and report every
//! hypervisor-backed command as a structured error instead of crashing.

use serde_json::{Map, Value};

use hvnode_vswitch::{
    ClassRef, Filter, Instance, InvocationOutcome, JobRef, JobStatus, ManagementPlane,
    MethodCall, PlaneError,
};

use crate::lifecycle::{ImportOptions, LifecycleError, VmLifecycle};

const PLACEHOLDER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::placeholder");
const UNAVAILABLE: &str = "no virtualization management plane is available on this host";

/// Management plane that rejects every call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct UnavailablePlane;

impl UnavailablePlane {
    fn reject<T>(operation: &str) -> Result<T, PlaneError> {
        tracing::warn!(
            target: PLACEHOLDER_TARGET,
            operation,
            "management plane call rejected"
        );
        Err(PlaneError::call(operation, UNAVAILABLE))
    }
}

impl ManagementPlane for UnavailablePlane {
    fn query(&self, _class: ClassRef, _filters: &[Filter]) -> Result<Instance, PlaneError> {
        Self::reject("query")
    }

    fn query_all(&self, _class: ClassRef, _filters: &[Filter]) -> Result<Vec<Instance>, PlaneError> {
        Self::reject("query_all")
    }

    fn associators(
        &self,
        _instance: &Instance,
        _result_class: ClassRef,
    ) -> Result<Vec<Instance>, PlaneError> {
        Self::reject("associators")
    }

    fn spawn_instance(&self, _class: ClassRef) -> Result<Instance, PlaneError> {
        Self::reject("spawn_instance")
    }

    fn default_instance(
        &self,
        _class: ClassRef,
        _resource_subtype: &str,
    ) -> Result<Instance, PlaneError> {
        Self::reject("default_instance")
    }

    fn serialize(&self, _instance: &Instance) -> Result<String, PlaneError> {
        Self::reject("serialize")
    }

    fn host_system_path(&self) -> Result<String, PlaneError> {
        Self::reject("host_system_path")
    }

    fn invoke(&self, call: &MethodCall) -> Result<InvocationOutcome, PlaneError> {
        Self::reject(call.name())
    }

    fn job_status(&self, _job: &JobRef) -> Result<JobStatus, PlaneError> {
        Self::reject("job_status")
    }
}

/// Lifecycle provider that reports every operation as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct UnavailableLifecycle;

impl UnavailableLifecycle {
    fn unavailable(operation: &'static str) -> LifecycleError {
        tracing::warn!(
            target: PLACEHOLDER_TARGET,
            operation,
            "lifecycle operation requested but no provider is linked in"
        );
        LifecycleError::Unavailable {
            reason: UNAVAILABLE.to_owned(),
        }
    }
}

impl VmLifecycle for UnavailableLifecycle {
    fn start_vm(&self) -> Result<(), LifecycleError> {
        Err(Self::unavailable("start-vm"))
    }

    fn stop_vm(&self) -> Result<(), LifecycleError> {
        Err(Self::unavailable("stop-vm"))
    }

    fn import_vm(
        &self,
        _options: &ImportOptions,
        _progress: &mut dyn FnMut(u8),
    ) -> Result<(), LifecycleError> {
        Err(Self::unavailable("import-vm"))
    }

    fn guest_kvp(&self) -> Value {
        Value::Object(Map::new())
    }
}
