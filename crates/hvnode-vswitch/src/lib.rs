//! Virtual switch reconciliation for the hypervisor host.
//!
//! The crate owns three pieces:
//!
//! - [`AdapterSelector`] picks the physical adapter a switch binds to;
//! - [`JobWaiter`] turns asynchronous management-plane mutations into a
//!   blocking, bounded `Result`;
//! - [`SwitchReconciler`] creates, repairs and removes the managed switch.
//!
//! All of them operate on a [`ManagementPlane`], the contract an
//! implementation backed by the host's virtualization management service
//! must satisfy. The `test-support` feature exposes [`fake::FakePlane`], an
//! in-memory implementation for integration tests.

pub mod adapter;
pub mod classes;
mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod job;
pub mod plane;
pub mod reconcile;

pub use adapter::{AdapterSelector, Medium, PhysicalAdapter, SelectedAdapter};
pub use error::SwitchError;
pub use job::{JobError, JobPolicy, JobWaiter};
pub use plane::{
    ClassRef, Filter, Instance, InvocationOutcome, JobRef, JobState, JobStatus, ManagementPlane,
    MethodCall, Namespace, PlaneError,
};
pub use reconcile::{DEFAULT_SWITCH_NOTE, PortDescriptor, SwitchReconciler, VirtualSwitch};
