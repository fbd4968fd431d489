// src/store/mod.rs

//! Durable persistence for locations, tasks, log sessions, file lists and
//! simple settings.
//!
//! The traits are grouped by concern so that callers can ask for exactly the
//! capability they need (the executor only needs [`FilelistStore`] and
//! [`TaskStore`], the log sinks only [`LogStore`]). [`Store`] is the union and
//! is implemented automatically.
//!
//! - [`file::FileStore`] keeps everything under one directory.
//! - [`memory::MemoryStore`] keeps everything in memory (tests, dry runs).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLocationRecord {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocationRecord {
    pub remote_type: String,
    pub address: String,
    pub username: String,
    pub password: String,
    pub remote: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTypeRecord {
    pub mount: String,
    pub unmount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeRecord {
    pub cmd: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub src: String,
    pub task_type: String,
    pub dst: String,
}

pub trait LocationStore: Send + Sync {
    fn list_local_locations(&self) -> Result<Vec<String>>;
    fn read_local_location(&self, name: &str) -> Result<LocalLocationRecord>;
    fn add_local_location(&self, name: &str, record: &LocalLocationRecord) -> Result<()>;
    fn remove_local_location(&self, name: &str) -> Result<()>;

    fn list_remote_location_types(&self) -> Result<Vec<String>>;
    fn read_remote_location_type(&self, name: &str) -> Result<RemoteTypeRecord>;
    fn add_remote_location_type(&self, name: &str, record: &RemoteTypeRecord) -> Result<()>;
    fn remove_remote_location_type(&self, name: &str) -> Result<()>;

    fn list_remote_locations(&self) -> Result<Vec<String>>;
    fn read_remote_location(&self, name: &str) -> Result<RemoteLocationRecord>;
    fn add_remote_location(&self, name: &str, record: &RemoteLocationRecord) -> Result<()>;
    fn remove_remote_location(&self, name: &str) -> Result<()>;
}

pub trait TaskStore: Send + Sync {
    fn list_task_types(&self) -> Result<Vec<String>>;
    fn read_task_type(&self, name: &str) -> Result<TaskTypeRecord>;
    fn add_task_type(&self, name: &str, record: &TaskTypeRecord) -> Result<()>;
    fn remove_task_type(&self, name: &str) -> Result<()>;

    fn list_tasks(&self) -> Result<Vec<String>>;
    fn read_task(&self, name: &str) -> Result<TaskRecord>;
    fn add_task(&self, name: &str, record: &TaskRecord) -> Result<()>;
    fn remove_task(&self, name: &str) -> Result<()>;

    /// Completion history, in the order it was recorded.
    fn list_task_completed(&self, name: &str) -> Result<Vec<DateTime<Utc>>>;
    /// Append one completion record. Duplicate timestamps are kept.
    fn add_task_completed(&self, name: &str, at: DateTime<Utc>) -> Result<()>;
    /// Drop the whole completion history of a task.
    fn remove_task_completed(&self, name: &str) -> Result<()>;
}

pub trait LogStore: Send + Sync {
    fn new_log_session(&self, key: DateTime<Utc>) -> Result<()>;
    fn list_log_sessions(&self) -> Result<Vec<DateTime<Utc>>>;
    fn is_log_session_open(&self, key: DateTime<Utc>) -> bool;
    fn read_log_session(&self, key: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, String)>>;
    fn write_to_log_session(&self, key: DateTime<Utc>, line: &str) -> Result<()>;
    fn close_log_session(&self, key: DateTime<Utc>) -> Result<()>;
    fn delete_log_session(&self, key: DateTime<Utc>) -> Result<()>;
}

pub trait FilelistStore: Send + Sync {
    fn list_filelists(&self) -> Result<Vec<(String, DateTime<Utc>)>>;
    fn read_filelist(&self, location: &str, at: DateTime<Utc>) -> Result<Vec<String>>;
    fn add_filelist(&self, location: &str, at: DateTime<Utc>, files: &[String]) -> Result<()>;
    fn remove_filelist(&self, location: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Persisted overrides for settings that otherwise come from the config file.
pub trait ConfigStore: Send + Sync {
    fn get_wait_time(&self) -> Result<Option<Duration>>;
    fn set_wait_time(&self, wait: Duration) -> Result<()>;
    fn reset_wait_time(&self) -> Result<()>;
    fn get_mount_folder(&self) -> Result<Option<String>>;
    fn set_mount_folder(&self, folder: &str) -> Result<()>;
    fn reset_mount_folder(&self) -> Result<()>;
}

pub trait Store: LocationStore + TaskStore + LogStore + FilelistStore + ConfigStore {}

impl<T> Store for T where T: LocationStore + TaskStore + LogStore + FilelistStore + ConfigStore {}
