//! In-memory management plane for tests.
//!
//! [`FakePlane`] stores instances per class, tracks associations between
//! object paths, records every method call, and applies the effect of each
//! mutation the way the hypervisor would. Jobs can be made asynchronous, and
//! individual methods or class queries can be made to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::classes::{
    DEVICE_ID_PREFIX, EXTERNAL_ETHERNET_PORT, NETWORK_ADAPTER, PHYSICAL_MEDIUM, PORT_ALLOCATION,
    SWITCH_SETTINGS, VIRTUAL_SWITCH, WIFI_PORT, property,
};
use crate::plane::{
    ClassRef, Filter, Instance, InvocationOutcome, JobRef, JobStatus, ManagementPlane,
    MethodCall, PlaneError,
};

/// Object path of the fake host computer system.
pub const HOST_SYSTEM_PATH: &str = r"\\HOST\root\virtualization\v2:Msvm_ComputerSystem.Name='HOST'";

/// Scripted failure for a management-service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeFailure {
    /// The call itself errors.
    Call(String),
    /// The method returns the given non-success code.
    ReturnValue(u32),
    /// The method starts a job that fails with the given description.
    Job(String),
}

#[derive(Debug, Default)]
struct State {
    instances: BTreeMap<&'static str, Vec<Instance>>,
    associations: HashMap<String, Vec<String>>,
    calls: Vec<MethodCall>,
    failures: HashMap<&'static str, FakeFailure>,
    failing_queries: HashSet<&'static str>,
    jobs: HashMap<String, (u32, JobStatus)>,
    job_polls: u32,
    async_jobs: Option<u32>,
    next_id: u32,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn insert(&mut self, class: ClassRef, instance: Instance) {
        self.instances.entry(class.name).or_default().push(instance);
    }

    fn find_by_path(&self, path: &str) -> Option<&Instance> {
        self.instances
            .values()
            .flatten()
            .find(|instance| instance.path().is_ok_and(|candidate| candidate == path))
    }

    fn remove_by_path(&mut self, path: &str) {
        for instances in self.instances.values_mut() {
            instances.retain(|instance| !instance.path().is_ok_and(|candidate| candidate == path));
        }
        self.associations.remove(path);
        for linked in self.associations.values_mut() {
            linked.retain(|candidate| candidate != path);
        }
    }

    fn associate(&mut self, left: &str, right: &str) {
        self.associations
            .entry(left.to_owned())
            .or_default()
            .push(right.to_owned());
        self.associations
            .entry(right.to_owned())
            .or_default()
            .push(left.to_owned());
    }

    fn add_ports(&mut self, settings_path: &str, ports: &[String]) -> Result<(), PlaneError> {
        for text in ports {
            let path = format!("{}.InstanceID='port-{}'", PORT_ALLOCATION.name, self.next_id());
            let port = parse_instance(text)?.with_path(path.clone());
            self.insert(PORT_ALLOCATION, port);
            self.associate(settings_path, &path);
        }
        Ok(())
    }

    fn apply(&mut self, call: &MethodCall) -> Result<(), PlaneError> {
        match call {
            MethodCall::DefineSystem {
                system_settings,
                resource_settings,
            } => {
                let settings = parse_instance(system_settings)?;
                let name = settings.str_property(property::ELEMENT_NAME)?.to_owned();
                let id = self.next_id();
                let switch_path = format!("{}.Name='switch-{id}'", VIRTUAL_SWITCH.name);
                let settings_path = format!("{}.InstanceID='settings-{id}'", SWITCH_SETTINGS.name);
                self.insert(
                    VIRTUAL_SWITCH,
                    Instance::new(VIRTUAL_SWITCH.name)
                        .with_path(switch_path.clone())
                        .with_property(property::ELEMENT_NAME, name),
                );
                self.insert(SWITCH_SETTINGS, settings.with_path(settings_path.clone()));
                self.associate(&switch_path, &settings_path);
                self.add_ports(&settings_path, resource_settings)
            }
            MethodCall::DestroySystem { system } => {
                let settings = self.associations.get(system).cloned().unwrap_or_default();
                for settings_path in settings {
                    let ports = self
                        .associations
                        .get(&settings_path)
                        .cloned()
                        .unwrap_or_default();
                    for port in ports {
                        self.remove_by_path(&port);
                    }
                    self.remove_by_path(&settings_path);
                }
                self.remove_by_path(system);
                Ok(())
            }
            MethodCall::RemoveResourceSettings { resource_settings } => {
                for path in resource_settings {
                    self.remove_by_path(path);
                }
                Ok(())
            }
            MethodCall::AddResourceSettings {
                affected_configuration,
                resource_settings,
            } => {
                if self.find_by_path(affected_configuration).is_none() {
                    return Err(PlaneError::not_found(SWITCH_SETTINGS.name));
                }
                self.add_ports(affected_configuration, resource_settings)
            }
        }
    }
}

fn parse_instance(text: &str) -> Result<Instance, PlaneError> {
    serde_json::from_str(text).map_err(|error| PlaneError::call("parse instance", error.to_string()))
}

/// In-memory [`ManagementPlane`].
#[derive(Debug, Default)]
pub struct FakePlane {
    state: Mutex<State>,
}

impl FakePlane {
    /// Creates an empty plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a physical adapter and its medium entry.
    pub fn add_adapter(&self, guid: &str, name: &str, service_name: &str, medium_code: u32) {
        let mut state = self.state();
        state.insert(
            NETWORK_ADAPTER,
            Instance::new(NETWORK_ADAPTER.name)
                .with_property(property::GUID, guid)
                .with_property(property::NAME, name)
                .with_property(property::SERVICE_NAME, service_name)
                .with_property(property::PHYSICAL_ADAPTER, true),
        );
        state.insert(
            PHYSICAL_MEDIUM,
            Instance::new(PHYSICAL_MEDIUM.name)
                .with_property(property::INSTANCE_NAME, name)
                .with_property(property::NDIS_PHYSICAL_MEDIUM, medium_code),
        );
    }

    /// Adds an external ethernet port for the adapter with `guid`.
    pub fn add_external_port(&self, guid: &str, address: &str) {
        self.add_port(EXTERNAL_ETHERNET_PORT, guid, address);
    }

    /// Adds a wireless port for the adapter with `guid`.
    pub fn add_wifi_port(&self, guid: &str, address: &str) {
        self.add_port(WIFI_PORT, guid, address);
    }

    fn add_port(&self, class: ClassRef, guid: &str, address: &str) {
        let device_id = format!("{DEVICE_ID_PREFIX}{guid}");
        let port = Instance::new(class.name)
            .with_path(format!("{}.DeviceID='{device_id}'", class.name))
            .with_property(property::DEVICE_ID, device_id)
            .with_property(property::PERMANENT_ADDRESS, address);
        self.state().insert(class, port);
    }

    /// Makes mutations start jobs that report running for `polls` status reads.
    pub fn use_async_jobs(&self, polls: u32) {
        self.state().async_jobs = Some(polls);
    }

    /// Makes every later call of `method` fail.
    pub fn fail_method(&self, method: &'static str, failure: FakeFailure) {
        self.state().failures.insert(method, failure);
    }

    /// Makes every query of `class` fail with a call error.
    pub fn fail_queries(&self, class: ClassRef) {
        self.state().failing_queries.insert(class.name);
    }

    /// Every method call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().calls.clone()
    }

    /// Names of the method calls received so far, in order.
    #[must_use]
    pub fn call_names(&self) -> Vec<&'static str> {
        self.state().calls.iter().map(MethodCall::name).collect()
    }

    /// Number of job status reads served.
    #[must_use]
    pub fn job_polls(&self) -> u32 {
        self.state().job_polls
    }

    /// Element names of every switch present.
    #[must_use]
    pub fn switch_names(&self) -> Vec<String> {
        self.state()
            .instances
            .get(VIRTUAL_SWITCH.name)
            .into_iter()
            .flatten()
            .filter_map(|switch| switch.str_property(property::ELEMENT_NAME).ok())
            .map(str::to_owned)
            .collect()
    }

    /// Port allocations attached to the switch called `name`.
    #[must_use]
    pub fn ports_of(&self, name: &str) -> Vec<Instance> {
        let state = self.state();
        let switch_path = state
            .instances
            .get(VIRTUAL_SWITCH.name)
            .into_iter()
            .flatten()
            .find(|switch| switch.property_equals(property::ELEMENT_NAME, &Value::from(name)))
            .and_then(|switch| switch.path().ok().map(str::to_owned));
        let Some(switch_path) = switch_path else {
            return Vec::new();
        };
        let settings = state.associations.get(&switch_path).cloned().unwrap_or_default();
        settings
            .iter()
            .flat_map(|settings_path| state.associations.get(settings_path).cloned().unwrap_or_default())
            .filter_map(|path| state.find_by_path(&path).cloned())
            .filter(|instance| instance.class() == PORT_ALLOCATION.name)
            .collect()
    }
}

impl ManagementPlane for FakePlane {
    fn query(&self, class: ClassRef, filters: &[Filter]) -> Result<Instance, PlaneError> {
        self.query_all(class, filters)?
            .into_iter()
            .next()
            .ok_or_else(|| PlaneError::not_found(class.name))
    }

    fn query_all(&self, class: ClassRef, filters: &[Filter]) -> Result<Vec<Instance>, PlaneError> {
        let state = self.state();
        if state.failing_queries.contains(class.name) {
            return Err(PlaneError::call("query", format!("{} unavailable", class.name)));
        }
        Ok(state
            .instances
            .get(class.name)
            .into_iter()
            .flatten()
            .filter(|instance| filters.iter().all(|filter| filter.matches(instance)))
            .cloned()
            .collect())
    }

    fn associators(
        &self,
        instance: &Instance,
        result_class: ClassRef,
    ) -> Result<Vec<Instance>, PlaneError> {
        let path = instance.path()?;
        let state = self.state();
        Ok(state
            .associations
            .get(path)
            .into_iter()
            .flatten()
            .filter_map(|linked| state.find_by_path(linked))
            .filter(|linked| linked.class() == result_class.name)
            .cloned()
            .collect())
    }

    fn spawn_instance(&self, class: ClassRef) -> Result<Instance, PlaneError> {
        Ok(Instance::new(class.name))
    }

    fn default_instance(
        &self,
        class: ClassRef,
        resource_subtype: &str,
    ) -> Result<Instance, PlaneError> {
        Ok(Instance::new(class.name).with_property("ResourceSubType", resource_subtype))
    }

    fn serialize(&self, instance: &Instance) -> Result<String, PlaneError> {
        serde_json::to_string(instance)
            .map_err(|error| PlaneError::call("serialize instance", error.to_string()))
    }

    fn host_system_path(&self) -> Result<String, PlaneError> {
        Ok(HOST_SYSTEM_PATH.to_owned())
    }

    fn invoke(&self, call: &MethodCall) -> Result<InvocationOutcome, PlaneError> {
        let mut state = self.state();
        state.calls.push(call.clone());

        let status = match state.failures.get(call.name()).cloned() {
            Some(FakeFailure::Call(message)) => return Err(PlaneError::call(call.name(), message)),
            Some(FakeFailure::ReturnValue(code)) => {
                return Ok(InvocationOutcome::Failed { return_value: code });
            }
            Some(FakeFailure::Job(description)) => JobStatus::failed(description),
            None => {
                state.apply(call)?;
                JobStatus::completed()
            }
        };

        let async_jobs = state.async_jobs;
        match async_jobs {
            None if status.error_description.is_none() => Ok(InvocationOutcome::Completed),
            polls => {
                let job = JobRef::new(format!("Msvm_ConcreteJob.InstanceID='job-{}'", state.next_id()));
                state
                    .jobs
                    .insert(job.as_str().to_owned(), (polls.unwrap_or(0), status));
                Ok(InvocationOutcome::JobStarted(job))
            }
        }
    }

    fn job_status(&self, job: &JobRef) -> Result<JobStatus, PlaneError> {
        let mut state = self.state();
        state.job_polls += 1;
        let Some((remaining, status)) = state.jobs.get_mut(job.as_str()) else {
            return Err(PlaneError::not_found("Msvm_ConcreteJob"));
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(JobStatus::running());
        }
        Ok(status.clone())
    }
}
