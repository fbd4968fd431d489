// src/exec/task_runner.rs

//! Drives one task through locate, prepare, mount, sync and unmount.
//!
//! [`Executor::execute`] is serialized process-wide: at most one task is in
//! its protocol at any moment. Errors are logged, never returned; callers see
//! the outcome through the session log, [`Executor::busy_with`] and the
//! task's completion time.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use crate::errors::{MountsyncError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::logs::Log;
use crate::model::filelist::{save_snapshot, snapshot};
use crate::model::{Location, Locations, Task};
use crate::store::Store;
use crate::time;

use super::command::{CommandLauncher, CommandSpec, ExternalCommand};
use super::kernel::Kernel;

/// How a protocol run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Completed,
    /// The kernel was already blocked when the task was picked up.
    Blocked,
    /// A location could not be found on the network.
    NotLocated(String),
}

/// Unmounts owed for every mount that succeeded, released newest first.
#[derive(Default)]
struct MountStack {
    unmounts: Vec<Option<CommandSpec>>,
}

impl MountStack {
    fn push(&mut self, unmount: Option<CommandSpec>) {
        self.unmounts.push(unmount);
    }

    async fn release(mut self, executor: &Executor, log: &dyn Log) {
        while let Some(unmount) = self.unmounts.pop() {
            executor
                .kernel
                .sudo_run(log, executor.launch(unmount))
                .await;
        }
    }
}

pub struct Executor {
    kernel: Arc<Kernel>,
    launcher: Arc<dyn CommandLauncher>,
    fs: Arc<dyn FileSystem>,
    serial: tokio::sync::Mutex<()>,
    busy: Mutex<String>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("kernel", &self.kernel)
            .field("busy_with", &self.busy_with())
            .finish()
    }
}

impl Executor {
    pub fn new(kernel: Arc<Kernel>, launcher: Arc<dyn CommandLauncher>) -> Self {
        Self::with_file_system(kernel, launcher, Arc::new(RealFileSystem))
    }

    /// Like [`Executor::new`], with file-list snapshots taken through `fs`.
    pub fn with_file_system(
        kernel: Arc<Kernel>,
        launcher: Arc<dyn CommandLauncher>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            kernel,
            launcher,
            fs,
            serial: tokio::sync::Mutex::new(()),
            busy: Mutex::new(String::new()),
        }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn blocked(&self) -> bool {
        self.kernel.blocked()
    }

    /// Name of the task currently executing, empty when idle.
    pub fn busy_with(&self) -> String {
        self.busy_lock().clone()
    }

    /// Stop the running command, block the kernel, and wait until any task
    /// in flight has left its protocol.
    pub async fn stop_and_block(&self, log: &dyn Log) {
        self.block(log);
        self.wait_idle().await;
    }

    /// The synchronous half of [`Executor::stop_and_block`]: once this
    /// returns the kernel is blocked and the registered command was told to
    /// stop.
    pub fn block(&self, log: &dyn Log) {
        self.kernel.stop_and_block(log);
    }

    /// Resolves when no task is inside its protocol.
    pub async fn wait_idle(&self) {
        drop(self.serial.lock().await);
    }

    pub fn unblock(&self) {
        self.kernel.unblock();
    }

    pub async fn execute(
        &self,
        log: &dyn Log,
        task: &Task,
        locations: &Locations,
        store: &dyn Store,
    ) {
        let _serial = self.serial.lock().await;
        *self.busy_lock() = task.name().to_string();
        log.write(&format!("Executing Task {task}"));
        info!(task = %task.name(), "executing task");

        let mut mounts = MountStack::default();
        let result = self.run_protocol(log, task, locations, store, &mut mounts).await;
        mounts.release(self, log).await;

        match result {
            Ok(Outcome::Completed) => info!(task = %task.name(), "task completed"),
            Ok(Outcome::Blocked) => debug!(task = %task.name(), "kernel blocked; task skipped"),
            Ok(Outcome::NotLocated(location)) => {
                info!(task = %task.name(), location = %location, "location not reachable; task skipped")
            }
            Err(e) if e.is_interruption() => {
                log.write(&format!("Task {} interrupted: {e}", task.name()));
                info!(task = %task.name(), "task interrupted by pause");
            }
            Err(e) => {
                log.error(&e);
                error!(task = %task.name(), error = %e, "task failed");
            }
        }

        self.busy_lock().clear();
        log.write(&format!("Executed Task {task}"));
    }

    async fn run_protocol(
        &self,
        log: &dyn Log,
        task: &Task,
        locations: &Locations,
        store: &dyn Store,
        mounts: &mut MountStack,
    ) -> Result<Outcome> {
        if self.kernel.blocked() {
            return Ok(Outcome::Blocked);
        }

        let src = locations
            .get(task.src())
            .ok_or_else(|| MountsyncError::LocationDoesNotExist(task.src().to_string()))?;
        let dst = locations
            .get(task.dst())
            .ok_or_else(|| MountsyncError::LocationDoesNotExist(task.dst().to_string()))?;

        self.ensure_prepared(log, src).await?;
        self.ensure_prepared(log, dst).await?;

        // Clear stale mounts left behind by an earlier run.
        self.kernel.sudo_run(log, self.launch(src.umount_command())).await;
        self.kernel.sudo_run(log, self.launch(dst.umount_command())).await;

        for loc in [src, dst] {
            let output = self.kernel.run(log, self.launch(loc.located_command())).await?;
            if !loc.located(log, &output) {
                return Ok(Outcome::NotLocated(loc.name().to_string()));
            }
        }

        self.kernel.run(log, self.launch(src.mount_command())).await?;
        mounts.push(src.umount_command());
        self.kernel.run(log, self.launch(dst.mount_command())).await?;
        mounts.push(dst.umount_command());

        let work = task.command(locations)?;

        self.record_file_lists(store, src, dst)?;
        self.kernel.run(log, self.launch(work)).await?;
        self.record_file_lists(store, src, dst)?;

        task.complete(store, time::now())?;
        Ok(Outcome::Completed)
    }

    /// Probe the location; prepare it if the probe fails or says it is not
    /// prepared. Only a failing prepare aborts.
    async fn ensure_prepared(&self, log: &dyn Log, loc: &Location) -> Result<()> {
        let probe = self.kernel.run(log, self.launch(loc.prepared_command())).await;
        let prepared = matches!(&probe, Ok(output) if loc.prepared(log, output));
        if !prepared {
            debug!(location = %loc.name(), "preparing location");
            self.kernel.run(log, self.launch(loc.prepare_command())).await?;
        }
        Ok(())
    }

    fn record_file_lists(&self, store: &dyn Store, src: &Location, dst: &Location) -> Result<()> {
        for loc in [src, dst] {
            let files = snapshot(self.fs.as_ref(), Path::new(&loc.local_path()))?;
            save_snapshot(store, loc.name(), time::now(), &files)?;
        }
        Ok(())
    }

    fn launch(&self, spec: Option<CommandSpec>) -> Option<Arc<dyn ExternalCommand>> {
        spec.map(|spec| self.launcher.launch(spec))
    }

    fn busy_lock(&self) -> MutexGuard<'_, String> {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
