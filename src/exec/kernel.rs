// src/exec/kernel.rs

//! The single slot holding "the command currently running system-wide", plus
//! the global pause flag.
//!
//! The mutex only guards bookkeeping. The external call itself runs outside
//! the lock, which is what lets [`Kernel::stop_and_block`] reach in from
//! another task and stop the command that is presently registered.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::errors::{MountsyncError, Result};
use crate::logs::Log;

use super::command::ExternalCommand;

#[derive(Default)]
struct KernelState {
    running: Option<Arc<dyn ExternalCommand>>,
    blocked: bool,
}

#[derive(Default)]
pub struct Kernel {
    state: Mutex<KernelState>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Kernel")
            .field("blocked", &state.blocked)
            .field(
                "running",
                &state.running.as_ref().map(|c| c.describe()),
            )
            .finish()
    }
}

fn same_command(a: &Arc<dyn ExternalCommand>, b: &Arc<dyn ExternalCommand>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, KernelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn blocked(&self) -> bool {
        self.lock().blocked
    }

    /// Description of the registered command, if any.
    pub fn running(&self) -> Option<String> {
        self.lock().running.as_ref().map(|c| c.describe())
    }

    /// Block ordinary runs and stop whatever command is registered.
    ///
    /// The command is stopped after the lock is released, so its `stop` may
    /// call back into the kernel.
    pub fn stop_and_block(&self, log: &dyn Log) {
        let running = {
            let mut state = self.lock();
            state.blocked = true;
            state.running.take()
        };
        debug!("kernel blocked");
        if let Some(running) = running {
            info!(command = %running.describe(), "stopping running command");
            running.stop(log);
        }
    }

    pub fn unblock(&self) {
        self.lock().blocked = false;
        debug!("kernel unblocked");
    }

    /// Run `command` unless the kernel is blocked.
    ///
    /// `None` is the no-op command and resolves to empty output.
    pub async fn run(
        &self,
        log: &dyn Log,
        command: Option<Arc<dyn ExternalCommand>>,
    ) -> Result<String> {
        let command = {
            let mut state = self.lock();
            if state.blocked {
                return Err(MountsyncError::Paused);
            }
            let Some(command) = command else {
                return Ok(String::new());
            };
            state.running = Some(command.clone());
            command
        };

        let result = command.run(log).await;
        self.release(&command);
        result
    }

    /// Run `command` even while blocked. Used for unmounts and cleanup.
    /// Failures are logged, never returned.
    pub async fn sudo_run(&self, log: &dyn Log, command: Option<Arc<dyn ExternalCommand>>) {
        let Some(command) = command else {
            return;
        };
        self.lock().running = Some(command.clone());

        if let Err(e) = command.run(log).await {
            warn!(command = %command.describe(), error = %e, "privileged run failed");
            log.error(&e);
        }
        self.release(&command);
    }

    /// Clear the slot if it still holds `command`. Another run may have
    /// replaced it in the meantime.
    fn release(&self, command: &Arc<dyn ExternalCommand>) {
        let mut state = self.lock();
        if state
            .running
            .as_ref()
            .is_some_and(|current| same_command(current, command))
        {
            state.running = None;
        }
    }
}
