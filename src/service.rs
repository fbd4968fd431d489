// src/service.rs

//! The application object: registries, settings and the executor behind one
//! handle that the scheduler and the CLI drive.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::errors::{MountsyncError, Result};
use crate::exec::Executor;
use crate::logs::{self, Log, LogLine, LogSessionSummary, SessionLog, TracingLog};
use crate::model::location::{add_remote_location_type, list_remote_location_types};
use crate::model::task::{add_task_type, list_task_types};
use crate::model::{diffs_per_location, Diff, Location, Locations, RemoteLocationType, Task, TaskType, Tasks};
use crate::store::Store;
use crate::time;
use crate::types::TaskName;

/// Values used when the store holds no override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefaults {
    pub wait_time: Duration,
    pub mount_folder: String,
}

#[derive(Debug, Default)]
struct Registry {
    locations: Locations,
    tasks: Tasks,
}

pub struct SyncService {
    store: Arc<dyn Store>,
    executor: Executor,
    defaults: ServiceDefaults,
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("executor", &self.executor)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl SyncService {
    /// Load locations and tasks from `store`.
    pub fn open(store: Arc<dyn Store>, executor: Executor, defaults: ServiceDefaults) -> Result<Self> {
        let mount_folder = store
            .get_mount_folder()?
            .unwrap_or_else(|| defaults.mount_folder.clone());
        let log = TracingLog;
        let locations = Locations::load(store.as_ref(), &mount_folder, &log)?;
        let tasks = Tasks::load(store.as_ref(), &log)?;
        info!(
            locations = locations.len(),
            tasks = tasks.len(),
            mount_folder = %mount_folder,
            "service loaded"
        );

        Ok(Self {
            store,
            executor,
            defaults,
            registry: Mutex::new(Registry { locations, tasks }),
        })
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    // --- settings -------------------------------------------------------

    pub fn wait_time(&self) -> Duration {
        match self.store.get_wait_time() {
            Ok(Some(wait)) if !wait.is_zero() => wait,
            Ok(_) => self.defaults.wait_time,
            Err(e) => {
                warn!(error = %e, "reading wait time failed; using default");
                self.defaults.wait_time
            }
        }
    }

    pub fn set_wait_time(&self, wait: Duration) -> Result<()> {
        if wait.is_zero() {
            return Err(MountsyncError::ConfigError("wait time must be non-zero".into()));
        }
        self.store.set_wait_time(wait)?;
        info!(wait_time = ?wait, "wait time changed");
        Ok(())
    }

    pub fn reset_wait_time(&self) -> Result<()> {
        self.store.reset_wait_time()
    }

    pub fn mount_folder(&self) -> Result<String> {
        Ok(self
            .store
            .get_mount_folder()?
            .unwrap_or_else(|| self.defaults.mount_folder.clone()))
    }

    // --- locations ------------------------------------------------------

    pub fn locations(&self) -> Locations {
        self.registry().locations.clone()
    }

    pub fn remote_location_types(&self) -> Result<Vec<RemoteLocationType>> {
        list_remote_location_types(self.store.as_ref())
    }

    pub fn add_remote_location_type(&self, remote_type: &RemoteLocationType) -> Result<()> {
        add_remote_location_type(self.store.as_ref(), remote_type)
    }

    /// Add a location. A remote location must name a stored remote type.
    pub fn add_location(&self, loc: Location) -> Result<()> {
        if let Location::Remote(remote) = &loc {
            let known = self.store.list_remote_location_types()?;
            if !known.contains(&remote.remote_type.name) {
                return Err(MountsyncError::RemoteLocationTypeDoesNotExist(
                    remote.remote_type.name.clone(),
                ));
            }
        }
        self.registry().locations.add(self.store.as_ref(), loc)
    }

    /// Remove a location no task refers to.
    pub fn remove_location(&self, name: &str) -> Result<()> {
        let mut registry = self.registry();
        if let Some(task) = registry.tasks.using_location(name) {
            return Err(MountsyncError::LocationInUse {
                location: name.to_string(),
                task: task.name().to_string(),
            });
        }
        registry.locations.remove(self.store.as_ref(), name)?;
        Ok(())
    }

    // --- tasks ----------------------------------------------------------

    pub fn tasks(&self) -> Tasks {
        self.registry().tasks.clone()
    }

    pub fn task_types(&self) -> Result<Vec<TaskType>> {
        list_task_types(self.store.as_ref())
    }

    pub fn add_task_type(&self, task_type: &TaskType) -> Result<()> {
        add_task_type(self.store.as_ref(), task_type)
    }

    pub fn remove_task_type(&self, name: &str) -> Result<()> {
        let registry = self.registry();
        if let Some(task) = registry.tasks.using_task_type(name) {
            return Err(MountsyncError::ConfigError(format!(
                "task type {name} is used by task {}",
                task.name()
            )));
        }
        self.store.remove_task_type(name)
    }

    /// Add a task whose endpoints are both known locations and whose type is
    /// stored.
    pub fn add_task(&self, task: Task) -> Result<()> {
        let type_name = &task.task_type().name;
        if !self.store.list_task_types()?.contains(type_name) {
            return Err(MountsyncError::TaskTypeDoesNotExist(type_name.clone()));
        }
        let mut registry = self.registry();
        for endpoint in [task.src(), task.dst()] {
            if !registry.locations.contains(endpoint) {
                return Err(MountsyncError::LocationDoesNotExist(endpoint.to_string()));
            }
        }
        registry.tasks.add(self.store.as_ref(), task)
    }

    pub fn remove_task(&self, name: &str) -> Result<()> {
        self.registry().tasks.remove(self.store.as_ref(), name)?;
        Ok(())
    }

    // --- execution ------------------------------------------------------

    pub fn blocked(&self) -> bool {
        self.executor.blocked()
    }

    pub fn busy_with(&self) -> String {
        self.executor.busy_with()
    }

    pub async fn stop_and_block(&self) {
        self.block();
        self.wait_idle().await;
    }

    /// Block the kernel and stop the registered command without waiting for
    /// the task in flight to unwind.
    pub fn block(&self) {
        match self.open_session() {
            Ok(log) => {
                self.executor.block(&log);
                log.write("Stopped and blocked");
                log.close();
            }
            Err(e) => {
                warn!(error = %e, "could not open log session for stop");
                self.executor.block(&TracingLog);
            }
        }
    }

    pub async fn wait_idle(&self) {
        self.executor.wait_idle().await;
    }

    pub fn unblock(&self) {
        self.executor.unblock();
    }

    /// Execute one task in its own log session.
    pub async fn run_task(&self, name: &str) -> Result<()> {
        let (task, locations) = {
            let registry = self.registry();
            let task = registry
                .tasks
                .get(name)
                .cloned()
                .ok_or_else(|| MountsyncError::TaskDoesNotExist(name.to_string()))?;
            (task, registry.locations.clone())
        };

        let log = self.open_session()?;
        self.executor
            .execute(&log, &task, &locations, self.store.as_ref())
            .await;
        log.close();
        Ok(())
    }

    /// Execute every task once, one after the other, in name order.
    pub async fn run_all(&self) {
        let names: Vec<TaskName> = self.registry().tasks.names();
        debug!(tasks = names.len(), "running all tasks");
        for name in names {
            if let Err(e) = self.run_task(&name).await {
                warn!(task = %name, error = %e, "task could not be started");
            }
        }
    }

    // --- history --------------------------------------------------------

    pub fn logs(&self) -> Result<Vec<LogSessionSummary>> {
        logs::list_sessions(self.store.as_ref())
    }

    pub fn read_log(&self, key: DateTime<Utc>) -> Result<Vec<LogLine>> {
        logs::read_session(self.store.as_ref(), key)
    }

    pub fn delete_log(&self, key: DateTime<Utc>) -> Result<()> {
        logs::delete_session(self.store.as_ref(), key)
    }

    pub fn diffs(&self) -> Result<BTreeMap<String, Vec<Diff>>> {
        diffs_per_location(self.store.as_ref())
    }

    /// Open a session keyed by the current time. Keys must be unique, so a
    /// collision moves the key forward by a nanosecond.
    fn open_session(&self) -> Result<SessionLog> {
        let mut key = time::now();
        loop {
            match SessionLog::open(self.store.clone(), key) {
                Err(MountsyncError::LogSessionAlreadyExists(_)) => {
                    key += TimeDelta::nanoseconds(1);
                }
                other => return other,
            }
        }
    }
}
