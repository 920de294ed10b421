//! Test suites for the hvnode daemon.

#[cfg(unix)]
mod process_behaviour;
pub(crate) mod support;
