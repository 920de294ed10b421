//! Capability contract required from the virtualization management plane.
//!
//! The reconciler never speaks the plane's wire protocol. It needs only the
//! operations on [`ManagementPlane`]: class queries, association traversal,
//! instance templating and serialisation, method invocation on the switch
//! management service, and job inspection.
//!
//! Mutating calls report either an immediate terminal outcome or a started
//! job; see [`InvocationOutcome`].

mod error;
mod instance;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use self::error::PlaneError;
pub use self::instance::Instance;

/// Namespace a class lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Hypervisor virtualization objects (`root\virtualization\v2`).
    Virtualization,
    /// Core operating-system objects (`root\cimv2`).
    Cimv2,
    /// Driver-provided objects (`root\wmi`).
    Wmi,
}

impl Namespace {
    /// Canonical namespace path.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Virtualization => r"root\virtualization\v2",
            Self::Cimv2 => r"root\cimv2",
            Self::Wmi => r"root\wmi",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Fully qualified class reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef {
    /// Namespace holding the class.
    pub namespace: Namespace,
    /// Class name.
    pub name: &'static str,
}

impl ClassRef {
    /// Builds a class reference.
    #[must_use]
    pub const fn new(namespace: Namespace, name: &'static str) -> Self {
        Self { namespace, name }
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.namespace, self.name)
    }
}

/// Equality filter applied to a query. Multiple filters are conjunctive.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Property name.
    pub property: &'static str,
    /// Expected value.
    pub value: Value,
}

impl Filter {
    /// Builds an equality filter.
    #[must_use]
    pub fn equals(property: &'static str, value: impl Into<Value>) -> Self {
        Self {
            property,
            value: value.into(),
        }
    }

    /// Returns `true` when the instance satisfies the filter.
    #[must_use]
    pub fn matches(&self, instance: &Instance) -> bool {
        instance.property_equals(self.property, &self.value)
    }
}

/// Mutations the reconciler submits to the switch management service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    /// Creates a switch from serialised settings and port allocations.
    DefineSystem {
        /// Serialised switch settings instance.
        system_settings: String,
        /// Serialised port allocation instances.
        resource_settings: Vec<String>,
    },
    /// Destroys the switch at the given object path.
    DestroySystem {
        /// Switch object path.
        system: String,
    },
    /// Removes the port allocations at the given object paths.
    RemoveResourceSettings {
        /// Port allocation object paths.
        resource_settings: Vec<String>,
    },
    /// Adds port allocations to an existing switch configuration.
    AddResourceSettings {
        /// Switch settings object path.
        affected_configuration: String,
        /// Serialised port allocation instances.
        resource_settings: Vec<String>,
    },
}

impl MethodCall {
    /// Management-service method name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DefineSystem { .. } => "DefineSystem",
            Self::DestroySystem { .. } => "DestroySystem",
            Self::RemoveResourceSettings { .. } => "RemoveResourceSettings",
            Self::AddResourceSettings { .. } => "AddResourceSettings",
        }
    }
}

/// Method return value signalling synchronous completion.
pub const RETURN_COMPLETED: u32 = 0;
/// Method return value signalling that a job was started.
pub const RETURN_JOB_STARTED: u32 = 4096;

/// Reference to an in-flight job object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobRef(String);

impl JobRef {
    /// Wraps a job object path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Job object path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Immediate result of a mutating method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The mutation finished synchronously.
    Completed,
    /// The mutation continues asynchronously as the referenced job.
    JobStarted(JobRef),
    /// The method rejected the call with a non-success return value.
    Failed {
        /// Raw method return value.
        return_value: u32,
    },
}

impl InvocationOutcome {
    /// Interprets a raw method return value and its job output parameter.
    ///
    /// A "job started" value without a job reference cannot be awaited and is
    /// reported as a failure.
    #[must_use]
    pub fn from_return_value(return_value: u32, job: Option<JobRef>) -> Self {
        match (return_value, job) {
            (RETURN_COMPLETED, _) => Self::Completed,
            (RETURN_JOB_STARTED, Some(job)) => Self::JobStarted(job),
            (return_value, _) => Self::Failed { return_value },
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted but not started.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl JobState {
    /// Maps a CIM `JobState` code.
    ///
    /// New and Starting are pending; Running, Suspended, Shutting Down and
    /// Service are running; Terminated, Killed and Exception are failures.
    /// Unknown codes are treated as running so the bounded poll decides.
    #[must_use]
    pub const fn from_cim_code(code: u16) -> Self {
        match code {
            2 | 3 => Self::Pending,
            7 => Self::Completed,
            8..=10 => Self::Failed,
            _ => Self::Running,
        }
    }
}

/// Snapshot of a job object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// Current state.
    pub state: JobState,
    /// Failure description reported by the plane.
    pub error_description: Option<String>,
}

impl JobStatus {
    /// Status of a job that has not finished yet.
    #[must_use]
    pub const fn running() -> Self {
        Self {
            state: JobState::Running,
            error_description: None,
        }
    }

    /// Status of a successfully finished job.
    #[must_use]
    pub const fn completed() -> Self {
        Self {
            state: JobState::Completed,
            error_description: None,
        }
    }

    /// Status of a failed job.
    #[must_use]
    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            error_description: Some(description.into()),
        }
    }
}

/// Operations the switch reconciler needs from the management plane.
///
/// Implementations talk to the host's virtualization management service.
/// Every call re-reads live state; implementations must not cache.
#[cfg_attr(test, mockall::automock)]
pub trait ManagementPlane: Send + Sync {
    /// Returns the single instance of `class` matching all filters.
    ///
    /// Returns [`PlaneError::NotFound`] when nothing matches.
    fn query(&self, class: ClassRef, filters: &[Filter]) -> Result<Instance, PlaneError>;

    /// Returns every instance of `class` matching all filters, in enumeration order.
    fn query_all(&self, class: ClassRef, filters: &[Filter]) -> Result<Vec<Instance>, PlaneError>;

    /// Returns instances of `result_class` associated with `instance`.
    fn associators(
        &self,
        instance: &Instance,
        result_class: ClassRef,
    ) -> Result<Vec<Instance>, PlaneError>;

    /// Creates a fresh, editable instance of `class`.
    fn spawn_instance(&self, class: ClassRef) -> Result<Instance, PlaneError>;

    /// Returns the class default instance for a resource subtype.
    fn default_instance(
        &self,
        class: ClassRef,
        resource_subtype: &str,
    ) -> Result<Instance, PlaneError>;

    /// Serialises an instance to the textual form accepted by method calls.
    fn serialize(&self, instance: &Instance) -> Result<String, PlaneError>;

    /// Object path of the host computer system.
    fn host_system_path(&self) -> Result<String, PlaneError>;

    /// Invokes a mutation on the switch management service.
    fn invoke(&self, call: &MethodCall) -> Result<InvocationOutcome, PlaneError>;

    /// Reads the current status of a job.
    ///
    /// May return [`PlaneError::NotFound`] briefly after the job was started.
    fn job_status(&self, job: &JobRef) -> Result<JobStatus, PlaneError>;
}

impl<T> ManagementPlane for Arc<T>
where
    T: ManagementPlane + ?Sized,
{
    fn query(&self, class: ClassRef, filters: &[Filter]) -> Result<Instance, PlaneError> {
        (**self).query(class, filters)
    }

    fn query_all(&self, class: ClassRef, filters: &[Filter]) -> Result<Vec<Instance>, PlaneError> {
        (**self).query_all(class, filters)
    }

    fn associators(
        &self,
        instance: &Instance,
        result_class: ClassRef,
    ) -> Result<Vec<Instance>, PlaneError> {
        (**self).associators(instance, result_class)
    }

    fn spawn_instance(&self, class: ClassRef) -> Result<Instance, PlaneError> {
        (**self).spawn_instance(class)
    }

    fn default_instance(
        &self,
        class: ClassRef,
        resource_subtype: &str,
    ) -> Result<Instance, PlaneError> {
        (**self).default_instance(class, resource_subtype)
    }

    fn serialize(&self, instance: &Instance) -> Result<String, PlaneError> {
        (**self).serialize(instance)
    }

    fn host_system_path(&self) -> Result<String, PlaneError> {
        (**self).host_system_path()
    }

    fn invoke(&self, call: &MethodCall) -> Result<InvocationOutcome, PlaneError> {
        (**self).invoke(call)
    }

    fn job_status(&self, job: &JobRef) -> Result<JobStatus, PlaneError> {
        (**self).job_status(job)
    }
}
