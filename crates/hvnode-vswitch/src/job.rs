//! Completion of asynchronous management-plane mutations.
//!
//! Mutating calls either finish synchronously or hand back a job reference.
//! [`JobWaiter`] turns both shapes into a single `Result`, polling started
//! jobs at a fixed interval until they reach a terminal state or the policy's
//! timeout elapses.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::plane::{InvocationOutcome, JobRef, JobState, ManagementPlane, PlaneError};

const JOB_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::job");

/// Bounds applied while awaiting a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicy {
    poll_interval: Duration,
    timeout: Duration,
}

impl JobPolicy {
    /// Builds a policy. A zero poll interval is raised to one millisecond.
    #[must_use]
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    /// Delay between status polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Maximum total wait.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(300))
    }
}

/// Reasons a mutation did not complete.
#[derive(Debug, Error)]
pub enum JobError {
    /// The method rejected the call outright.
    #[error("method returned {code}")]
    ReturnValue { code: u32 },
    /// The job reached a failed state.
    #[error("job failed: {description}")]
    Failed { description: String },
    /// The job did not reach a terminal state in time.
    #[error("job {job} still running after {waited:?}")]
    TimedOut { job: JobRef, waited: Duration },
    /// The job status could not be read.
    #[error("failed to query job status: {source}")]
    Query {
        #[source]
        source: PlaneError,
    },
}

/// Awaits mutation outcomes against a management plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobWaiter {
    policy: JobPolicy,
}

impl JobWaiter {
    /// Creates a waiter with the given bounds.
    #[must_use]
    pub const fn new(policy: JobPolicy) -> Self {
        Self { policy }
    }

    /// Blocks until `outcome` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::ReturnValue`] for an immediate failure,
    /// [`JobError::Failed`] when the job fails, [`JobError::TimedOut`] when
    /// the policy's timeout elapses, and [`JobError::Query`] when the job
    /// status cannot be read for any reason other than a transient not-found.
    pub fn await_outcome<P>(&self, plane: &P, outcome: InvocationOutcome) -> Result<(), JobError>
    where
        P: ManagementPlane + ?Sized,
    {
        match outcome {
            InvocationOutcome::Completed => Ok(()),
            InvocationOutcome::Failed { return_value } => {
                Err(JobError::ReturnValue { code: return_value })
            }
            InvocationOutcome::JobStarted(job) => self.poll(plane, &job),
        }
    }

    fn poll<P>(&self, plane: &P, job: &JobRef) -> Result<(), JobError>
    where
        P: ManagementPlane + ?Sized,
    {
        let started = Instant::now();
        loop {
            match plane.job_status(job) {
                Ok(status) => match status.state {
                    JobState::Completed => {
                        debug!(target: JOB_TARGET, job = %job, "job completed");
                        return Ok(());
                    }
                    JobState::Failed => {
                        let description = status
                            .error_description
                            .unwrap_or_else(|| String::from("no error description"));
                        warn!(target: JOB_TARGET, job = %job, %description, "job failed");
                        return Err(JobError::Failed { description });
                    }
                    JobState::Pending | JobState::Running => {}
                },
                // The job object may not be queryable immediately after creation.
                Err(error) if error.is_not_found() => {
                    debug!(target: JOB_TARGET, job = %job, "job not visible yet");
                }
                Err(source) => return Err(JobError::Query { source }),
            }

            let waited = started.elapsed();
            if waited >= self.policy.timeout {
                warn!(target: JOB_TARGET, job = %job, ?waited, "job timed out");
                return Err(JobError::TimedOut {
                    job: job.clone(),
                    waited,
                });
            }
            thread::sleep(self.policy.poll_interval.min(self.policy.timeout - waited));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::{JobStatus, MockManagementPlane};
    use mockall::Sequence;
    use rstest::{fixture, rstest};

    #[fixture]
    fn waiter() -> JobWaiter {
        JobWaiter::new(JobPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(200),
        ))
    }

    #[rstest]
    fn immediate_completion_does_not_poll(waiter: JobWaiter) {
        let mut plane = MockManagementPlane::new();
        plane.expect_job_status().never();

        waiter
            .await_outcome(&plane, InvocationOutcome::Completed)
            .expect("completed outcome succeeds");
    }

    #[rstest]
    fn immediate_failure_reports_return_value(waiter: JobWaiter) {
        let mut plane = MockManagementPlane::new();
        plane.expect_job_status().never();

        let error = waiter
            .await_outcome(&plane, InvocationOutcome::Failed { return_value: 32770 })
            .expect_err("failed outcome errors");
        assert!(matches!(error, JobError::ReturnValue { code: 32770 }));
    }

    #[rstest]
    fn failed_job_carries_description(waiter: JobWaiter) {
        let mut plane = MockManagementPlane::new();
        let mut sequence = Sequence::new();
        plane
            .expect_job_status()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(JobStatus::running()));
        plane
            .expect_job_status()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(JobStatus::failed("port is in use")));

        let error = waiter
            .await_outcome(&plane, InvocationOutcome::JobStarted(JobRef::new("job/1")))
            .expect_err("failed job errors");
        match error {
            JobError::Failed { description } => assert_eq!(description, "port is in use"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn transient_not_found_is_tolerated(waiter: JobWaiter) {
        let mut plane = MockManagementPlane::new();
        let mut sequence = Sequence::new();
        plane
            .expect_job_status()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|_| Err(PlaneError::not_found("Msvm_ConcreteJob")));
        plane
            .expect_job_status()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(JobStatus::completed()));

        waiter
            .await_outcome(&plane, InvocationOutcome::JobStarted(JobRef::new("job/2")))
            .expect("job completes after becoming visible");
    }

    #[rstest]
    fn query_failures_propagate(waiter: JobWaiter) {
        let mut plane = MockManagementPlane::new();
        plane
            .expect_job_status()
            .times(1)
            .returning(|_| Err(PlaneError::call("job_status", "RPC server unavailable")));

        let error = waiter
            .await_outcome(&plane, InvocationOutcome::JobStarted(JobRef::new("job/3")))
            .expect_err("query failure errors");
        assert!(matches!(error, JobError::Query { .. }));
    }

    #[test]
    fn never_finishing_job_times_out() {
        let waiter = JobWaiter::new(JobPolicy::new(
            Duration::from_millis(2),
            Duration::from_millis(20),
        ));
        let mut plane = MockManagementPlane::new();
        plane
            .expect_job_status()
            .returning(|_| Ok(JobStatus::running()));

        let error = waiter
            .await_outcome(&plane, InvocationOutcome::JobStarted(JobRef::new("job/4")))
            .expect_err("running job times out");
        match error {
            JobError::TimedOut { job, waited } => {
                assert_eq!(job.as_str(), "job/4");
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
