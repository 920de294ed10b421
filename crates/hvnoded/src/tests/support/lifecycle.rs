//! Scripted [`VmLifecycle`] used by dispatcher tests.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};

use crate::lifecycle::{ImportOptions, LifecycleError, VmLifecycle};

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Script {
    progress: Vec<u8>,
    start_failure: Option<String>,
    panic_on_import: bool,
    gate: Option<ImportGate>,
    imports: Vec<ImportOptions>,
    starts: usize,
    stops: usize,
}

#[derive(Debug)]
struct ImportGate {
    entered: SyncSender<()>,
    release: Receiver<()>,
}

/// Test side of a gated import.
#[derive(Debug)]
pub struct GateHandle {
    entered: Receiver<()>,
    release: SyncSender<()>,
}

impl GateHandle {
    /// Blocks until the gated import has started.
    pub fn wait_until_entered(&self) {
        self.entered
            .recv_timeout(GATE_TIMEOUT)
            .expect("import did not start in time");
    }

    /// Lets the gated import finish.
    pub fn release(&self) {
        self.release.send(()).expect("import gate dropped");
    }
}

/// Lifecycle whose behaviour is scripted by the test.
#[derive(Debug)]
pub struct ScriptedLifecycle {
    script: Mutex<Script>,
    kvp: Value,
}

impl ScriptedLifecycle {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            kvp: json!({ "NodeIP": "192.168.1.20", "NodeStatus": "running" }),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Percentages the import reports, in order.
    pub fn with_progress(self, steps: &[u8]) -> Self {
        self.script().progress = steps.to_vec();
        self
    }

    /// Makes `start_vm` fail with `message`.
    pub fn failing_start(self, message: &str) -> Self {
        self.script().start_failure = Some(message.to_owned());
        self
    }

    /// Makes the import panic.
    pub fn panicking_import(self) -> Self {
        self.script().panic_on_import = true;
        self
    }

    /// Holds the next import until the returned handle releases it.
    pub fn gate_next_import(&self) -> GateHandle {
        let (entered_tx, entered_rx) = mpsc::sync_channel(1);
        let (release_tx, release_rx) = mpsc::sync_channel(1);
        self.script().gate = Some(ImportGate {
            entered: entered_tx,
            release: release_rx,
        });
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn kvp(&self) -> &Value {
        &self.kvp
    }

    /// Options of every import that ran.
    pub fn imports(&self) -> Vec<ImportOptions> {
        self.script().imports.clone()
    }

    pub fn starts(&self) -> usize {
        self.script().starts
    }

    pub fn stops(&self) -> usize {
        self.script().stops
    }
}

impl VmLifecycle for ScriptedLifecycle {
    fn start_vm(&self) -> Result<(), LifecycleError> {
        let mut script = self.script();
        script.starts += 1;
        match &script.start_failure {
            Some(message) => Err(LifecycleError::failed("start-vm", message.clone())),
            None => Ok(()),
        }
    }

    fn stop_vm(&self) -> Result<(), LifecycleError> {
        self.script().stops += 1;
        Ok(())
    }

    fn import_vm(
        &self,
        options: &ImportOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(), LifecycleError> {
        let (steps, gate, explode) = {
            let mut script = self.script();
            script.imports.push(options.clone());
            (
                script.progress.clone(),
                script.gate.take(),
                script.panic_on_import,
            )
        };

        if let Some(gate) = gate {
            gate.entered.send(()).expect("gate handle dropped");
            gate.release
                .recv_timeout(GATE_TIMEOUT)
                .expect("import was not released in time");
        }
        assert!(!explode, "scripted import panic");
        for step in steps {
            progress(step);
        }
        Ok(())
    }

    fn guest_kvp(&self) -> Value {
        self.kvp.clone()
    }
}
