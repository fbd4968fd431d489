// src/store/memory.rs

//! Store that keeps everything in memory.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::{MountsyncError, Result};
use crate::time::to_key;

use super::{
    ConfigStore, FilelistStore, LocalLocationRecord, LocationStore, LogStore,
    RemoteLocationRecord, RemoteTypeRecord, TaskRecord, TaskStore, TaskTypeRecord,
};

#[derive(Debug, Default)]
struct Inner {
    locals: BTreeMap<String, LocalLocationRecord>,
    remote_types: BTreeMap<String, RemoteTypeRecord>,
    remotes: BTreeMap<String, RemoteLocationRecord>,
    task_types: BTreeMap<String, TaskTypeRecord>,
    tasks: BTreeMap<String, TaskRecord>,
    completed: BTreeMap<String, Vec<DateTime<Utc>>>,
    sessions: BTreeMap<DateTime<Utc>, Vec<(DateTime<Utc>, String)>>,
    open_sessions: BTreeSet<DateTime<Utc>>,
    filelists: BTreeMap<(String, DateTime<Utc>), Vec<String>>,
    wait_time: Option<Duration>,
    mount_folder: Option<String>,
}

/// In-memory [`super::Store`]. Cheap to construct; nothing survives a drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn get<T: Clone>(
    map: &BTreeMap<String, T>,
    name: &str,
    missing: impl FnOnce(String) -> MountsyncError,
) -> Result<T> {
    map.get(name).cloned().ok_or_else(|| missing(name.to_string()))
}

fn take<T>(
    map: &mut BTreeMap<String, T>,
    name: &str,
    missing: impl FnOnce(String) -> MountsyncError,
) -> Result<()> {
    map.remove(name)
        .map(|_| ())
        .ok_or_else(|| missing(name.to_string()))
}

impl LocationStore for MemoryStore {
    fn list_local_locations(&self) -> Result<Vec<String>> {
        Ok(self.lock().locals.keys().cloned().collect())
    }

    fn read_local_location(&self, name: &str) -> Result<LocalLocationRecord> {
        get(&self.lock().locals, name, MountsyncError::LocationDoesNotExist)
    }

    fn add_local_location(&self, name: &str, record: &LocalLocationRecord) -> Result<()> {
        self.lock().locals.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn remove_local_location(&self, name: &str) -> Result<()> {
        take(&mut self.lock().locals, name, MountsyncError::LocationDoesNotExist)
    }

    fn list_remote_location_types(&self) -> Result<Vec<String>> {
        Ok(self.lock().remote_types.keys().cloned().collect())
    }

    fn read_remote_location_type(&self, name: &str) -> Result<RemoteTypeRecord> {
        get(
            &self.lock().remote_types,
            name,
            MountsyncError::RemoteLocationTypeDoesNotExist,
        )
    }

    fn add_remote_location_type(&self, name: &str, record: &RemoteTypeRecord) -> Result<()> {
        self.lock()
            .remote_types
            .insert(name.to_string(), record.clone());
        Ok(())
    }

    fn remove_remote_location_type(&self, name: &str) -> Result<()> {
        take(
            &mut self.lock().remote_types,
            name,
            MountsyncError::RemoteLocationTypeDoesNotExist,
        )
    }

    fn list_remote_locations(&self) -> Result<Vec<String>> {
        Ok(self.lock().remotes.keys().cloned().collect())
    }

    fn read_remote_location(&self, name: &str) -> Result<RemoteLocationRecord> {
        get(&self.lock().remotes, name, MountsyncError::LocationDoesNotExist)
    }

    fn add_remote_location(&self, name: &str, record: &RemoteLocationRecord) -> Result<()> {
        self.lock().remotes.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn remove_remote_location(&self, name: &str) -> Result<()> {
        take(&mut self.lock().remotes, name, MountsyncError::LocationDoesNotExist)
    }
}

impl TaskStore for MemoryStore {
    fn list_task_types(&self) -> Result<Vec<String>> {
        Ok(self.lock().task_types.keys().cloned().collect())
    }

    fn read_task_type(&self, name: &str) -> Result<TaskTypeRecord> {
        get(&self.lock().task_types, name, MountsyncError::TaskTypeDoesNotExist)
    }

    fn add_task_type(&self, name: &str, record: &TaskTypeRecord) -> Result<()> {
        self.lock().task_types.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn remove_task_type(&self, name: &str) -> Result<()> {
        take(&mut self.lock().task_types, name, MountsyncError::TaskTypeDoesNotExist)
    }

    fn list_tasks(&self) -> Result<Vec<String>> {
        Ok(self.lock().tasks.keys().cloned().collect())
    }

    fn read_task(&self, name: &str) -> Result<TaskRecord> {
        get(&self.lock().tasks, name, MountsyncError::TaskDoesNotExist)
    }

    fn add_task(&self, name: &str, record: &TaskRecord) -> Result<()> {
        self.lock().tasks.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn remove_task(&self, name: &str) -> Result<()> {
        take(&mut self.lock().tasks, name, MountsyncError::TaskDoesNotExist)
    }

    fn list_task_completed(&self, name: &str) -> Result<Vec<DateTime<Utc>>> {
        Ok(self.lock().completed.get(name).cloned().unwrap_or_default())
    }

    fn add_task_completed(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.lock()
            .completed
            .entry(name.to_string())
            .or_default()
            .push(at);
        Ok(())
    }

    fn remove_task_completed(&self, name: &str) -> Result<()> {
        self.lock().completed.remove(name);
        Ok(())
    }
}

impl LogStore for MemoryStore {
    fn new_log_session(&self, key: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        if inner.sessions.contains_key(&key) {
            return Err(MountsyncError::LogSessionAlreadyExists(to_key(key)));
        }
        inner.sessions.insert(key, Vec::new());
        inner.open_sessions.insert(key);
        Ok(())
    }

    fn list_log_sessions(&self) -> Result<Vec<DateTime<Utc>>> {
        Ok(self.lock().sessions.keys().copied().collect())
    }

    fn is_log_session_open(&self, key: DateTime<Utc>) -> bool {
        self.lock().open_sessions.contains(&key)
    }

    fn read_log_session(&self, key: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, String)>> {
        self.lock()
            .sessions
            .get(&key)
            .cloned()
            .ok_or_else(|| MountsyncError::LogSessionDoesNotExist(to_key(key)))
    }

    fn write_to_log_session(&self, key: DateTime<Utc>, line: &str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.open_sessions.contains(&key) {
            return Err(MountsyncError::LogSessionDoesNotExist(to_key(key)));
        }
        inner
            .sessions
            .entry(key)
            .or_default()
            .push((crate::time::now(), line.to_string()));
        Ok(())
    }

    fn close_log_session(&self, key: DateTime<Utc>) -> Result<()> {
        if self.lock().open_sessions.remove(&key) {
            Ok(())
        } else {
            Err(MountsyncError::LogSessionDoesNotExist(to_key(key)))
        }
    }

    fn delete_log_session(&self, key: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        if inner.open_sessions.contains(&key) {
            return Err(MountsyncError::LogSessionIsOpen(to_key(key)));
        }
        inner
            .sessions
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| MountsyncError::LogSessionDoesNotExist(to_key(key)))
    }
}

impl FilelistStore for MemoryStore {
    fn list_filelists(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        Ok(self.lock().filelists.keys().cloned().collect())
    }

    fn read_filelist(&self, location: &str, at: DateTime<Utc>) -> Result<Vec<String>> {
        self.lock()
            .filelists
            .get(&(location.to_string(), at))
            .cloned()
            .ok_or_else(|| {
                MountsyncError::FilelistDoesNotExist(format!("{location}@{}", to_key(at)))
            })
    }

    fn add_filelist(&self, location: &str, at: DateTime<Utc>, files: &[String]) -> Result<()> {
        self.lock()
            .filelists
            .insert((location.to_string(), at), files.to_vec());
        Ok(())
    }

    fn remove_filelist(&self, location: &str, at: DateTime<Utc>) -> Result<()> {
        self.lock()
            .filelists
            .remove(&(location.to_string(), at))
            .map(|_| ())
            .ok_or_else(|| {
                MountsyncError::FilelistDoesNotExist(format!("{location}@{}", to_key(at)))
            })
    }
}

impl ConfigStore for MemoryStore {
    fn get_wait_time(&self) -> Result<Option<Duration>> {
        Ok(self.lock().wait_time)
    }

    fn set_wait_time(&self, wait: Duration) -> Result<()> {
        self.lock().wait_time = Some(wait);
        Ok(())
    }

    fn reset_wait_time(&self) -> Result<()> {
        self.lock().wait_time = None;
        Ok(())
    }

    fn get_mount_folder(&self) -> Result<Option<String>> {
        Ok(self.lock().mount_folder.clone())
    }

    fn set_mount_folder(&self, folder: &str) -> Result<()> {
        self.lock().mount_folder = Some(folder.to_string());
        Ok(())
    }

    fn reset_mount_folder(&self) -> Result<()> {
        self.lock().mount_folder = None;
        Ok(())
    }
}
