//! Errors surfaced by switch reconciliation.

use thiserror::Error;

use crate::job::JobError;
use crate::plane::PlaneError;

/// Failure of a reconciliation or selection operation.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// No switch carries the requested name.
    #[error("virtual switch '{name}' does not exist")]
    NotFound { name: String },
    /// A management-plane call failed.
    #[error("{operation} failed: {source}")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: PlaneError,
    },
    /// A mutation was accepted but did not complete successfully.
    #[error("{operation} did not complete: {source}")]
    Job {
        operation: &'static str,
        #[source]
        source: JobError,
    },
    /// No physical adapter matched the preference and exposed a switchable port.
    #[error("no usable {} adapter found", medium_label(*prefer_ethernet))]
    Unresolved { prefer_ethernet: bool },
}

impl SwitchError {
    pub(crate) fn plane(operation: &'static str) -> impl FnOnce(PlaneError) -> Self {
        move |source| Self::OperationFailed { operation, source }
    }

    pub(crate) fn job(operation: &'static str) -> impl FnOnce(JobError) -> Self {
        move |source| Self::Job { operation, source }
    }

    /// Returns `true` when the error denotes a missing switch.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn medium_label(prefer_ethernet: bool) -> &'static str {
    if prefer_ethernet {
        "ethernet"
    } else {
        "non-ethernet"
    }
}
