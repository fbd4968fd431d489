// src/model/task.rs

//! Sync tasks: a source location, a destination location, and the task type
//! whose command copies one onto the other.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{MountsyncError, Result};
use crate::exec::CommandSpec;
use crate::logs::Log;
use crate::store::{TaskRecord, TaskStore, TaskTypeRecord};
use crate::types::{validate_name, LocationName, TaskName};

use super::location::Locations;

/// Named command template with `{src}` and `{dst}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskType {
    pub name: String,
    pub template: String,
}

impl TaskType {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    pub fn command(&self, src: &str, dst: &str) -> Option<CommandSpec> {
        CommandSpec::from_template(&self.template, &[("src", src), ("dst", dst)])
    }
}

pub fn list_task_types(store: &dyn TaskStore) -> Result<Vec<TaskType>> {
    store
        .list_task_types()?
        .into_iter()
        .map(|name| {
            let record = store.read_task_type(&name)?;
            Ok(TaskType::new(name, record.cmd))
        })
        .collect()
}

pub fn add_task_type(store: &dyn TaskStore, task_type: &TaskType) -> Result<()> {
    validate_name(&task_type.name)?;
    store.add_task_type(
        &task_type.name,
        &TaskTypeRecord {
            cmd: task_type.template.clone(),
        },
    )
}

/// One sync job.
///
/// Clones share the completion timestamp, so a snapshot handed to the
/// executor still advances the registry's copy.
#[derive(Debug, Clone)]
pub struct Task {
    name: TaskName,
    src: LocationName,
    task_type: TaskType,
    dst: LocationName,
    last_completed: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} --{}--> {}",
            self.name, self.src, self.task_type.name, self.dst
        )
    }
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        src: impl Into<String>,
        task_type: TaskType,
        dst: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            src: src.into(),
            task_type,
            dst: dst.into(),
            last_completed: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        *self
            .last_completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a completion at `at`.
    ///
    /// The store keeps every completion; the in-memory value only ever moves
    /// forward.
    pub fn complete(&self, store: &dyn TaskStore, at: DateTime<Utc>) -> Result<()> {
        store.add_task_completed(&self.name, at)?;
        self.observe_completion(at);
        debug!(task = %self.name, completed_at = %at, "task completed");
        Ok(())
    }

    fn observe_completion(&self, at: DateTime<Utc>) {
        let mut last = self
            .last_completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_none_or(|prev| prev < at) {
            *last = Some(at);
        }
    }

    /// Work command with both endpoints rendered to their local paths.
    pub fn command(&self, locations: &Locations) -> Result<Option<CommandSpec>> {
        let src = locations
            .get(&self.src)
            .ok_or_else(|| MountsyncError::LocationDoesNotExist(self.src.clone()))?;
        let dst = locations
            .get(&self.dst)
            .ok_or_else(|| MountsyncError::LocationDoesNotExist(self.dst.clone()))?;
        Ok(self.task_type.command(&src.local_path(), &dst.local_path()))
    }

    fn record(&self) -> TaskRecord {
        TaskRecord {
            src: self.src.clone(),
            task_type: self.task_type.name.clone(),
            dst: self.dst.clone(),
        }
    }
}

/// Registry of tasks keyed by their unique name.
#[derive(Debug, Clone, Default)]
pub struct Tasks {
    entries: BTreeMap<TaskName, Task>,
}

impl FromIterator<Task> for Tasks {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|task| (task.name.clone(), task))
                .collect(),
        }
    }
}

impl Tasks {
    /// Build the registry from the store, restoring each task's newest
    /// completion. Tasks with an unknown type are logged and skipped.
    pub fn load(store: &dyn TaskStore, log: &dyn Log) -> Result<Self> {
        let types = list_task_types(store)?;
        let mut entries = BTreeMap::new();

        for name in store.list_tasks()? {
            let record = match store.read_task(&name) {
                Ok(record) => record,
                Err(e) => {
                    log.error(&e);
                    continue;
                }
            };
            let Some(task_type) = types.iter().find(|t| t.name == record.task_type) else {
                log.error(&MountsyncError::TaskTypeDoesNotExist(record.task_type.clone()));
                continue;
            };
            let task = Task::new(name.clone(), record.src, task_type.clone(), record.dst);
            for at in store.list_task_completed(&name)? {
                task.observe_completion(at);
            }
            log.write(&format!("Task configured: {task}"));
            entries.insert(name, task);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<TaskName> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First task that references `location` as source or destination.
    pub fn using_location(&self, location: &str) -> Option<&Task> {
        self.entries
            .values()
            .find(|t| t.src == location || t.dst == location)
    }

    pub fn using_task_type(&self, task_type: &str) -> Option<&Task> {
        self.entries.values().find(|t| t.task_type.name == task_type)
    }

    pub fn add(&mut self, store: &dyn TaskStore, task: Task) -> Result<()> {
        validate_name(&task.name)?;
        if self.entries.contains_key(&task.name) {
            return Err(MountsyncError::TaskAlreadyExists(task.name.clone()));
        }
        store.add_task(&task.name, &task.record())?;
        debug!(task = %task.name, "task added");
        self.entries.insert(task.name.clone(), task);
        Ok(())
    }

    /// Remove a task together with its completion history.
    pub fn remove(&mut self, store: &dyn TaskStore, name: &str) -> Result<Task> {
        if !self.entries.contains_key(name) {
            return Err(MountsyncError::TaskDoesNotExist(name.to_string()));
        }
        store.remove_task(name)?;
        store.remove_task_completed(name)?;
        debug!(task = %name, "task removed");
        self.entries
            .remove(name)
            .ok_or_else(|| MountsyncError::TaskDoesNotExist(name.to_string()))
    }
}
