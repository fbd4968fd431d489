// src/store/file.rs

//! Store that keeps everything under a single directory.
//!
//! Layout (relative to the store root):
//!
//! ```text
//! local/<name>.toml           remote/<name>.toml        remote_type/<name>.toml
//! task_type/<name>.toml       task/<name>.toml          completed/<task>.list
//! filelist/<location>---<timestamp>.list                log/<timestamp>.log
//! settings.toml
//! ```
//!
//! Records are TOML; completion histories, file lists and logs are plain
//! line-oriented text. All IO goes through [`FileSystem`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{MountsyncError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::time::{from_key, to_key};

use super::{
    ConfigStore, FilelistStore, LocalLocationRecord, LocationStore, LogStore,
    RemoteLocationRecord, RemoteTypeRecord, TaskRecord, TaskStore, TaskTypeRecord,
};

const RECORD_EXT: &str = "toml";
const LIST_EXT: &str = "list";
const LOG_EXT: &str = "log";
const LOG_TIME_SEP: &str = " | ";
const FILELIST_SEP: &str = "---";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wait_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mount_folder: Option<String>,
}

/// Directory-backed [`super::Store`].
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    open_sessions: Mutex<BTreeSet<DateTime<Utc>>>,
}

impl FileStore {
    /// Open a store rooted at `root` on the real filesystem.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_file_system(root, Arc::new(RealFileSystem))
    }

    pub fn with_file_system(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let root = root.into();
        fs.create_dir_all(&root)?;
        debug!(root = ?root, "opened file store");
        Ok(Self {
            root,
            fs,
            open_sessions: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sessions(&self) -> MutexGuard<'_, BTreeSet<DateTime<Utc>>> {
        self.open_sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_path(&self, kind: &str, name: &str) -> PathBuf {
        self.root.join(kind).join(format!("{name}.{RECORD_EXT}"))
    }

    fn completed_path(&self, task: &str) -> PathBuf {
        self.root.join("completed").join(format!("{task}.{LIST_EXT}"))
    }

    fn filelist_path(&self, location: &str, at: DateTime<Utc>) -> PathBuf {
        self.root
            .join("filelist")
            .join(format!("{location}{FILELIST_SEP}{}.{LIST_EXT}", to_key(at)))
    }

    fn log_path(&self, key: DateTime<Utc>) -> PathBuf {
        self.root.join("log").join(format!("{}.{LOG_EXT}", to_key(key)))
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.toml")
    }

    /// File stems in `root/<kind>` that carry the given extension.
    fn list_stems(&self, kind: &str, ext: &str) -> Result<Vec<String>> {
        let dir = self.root.join(kind);
        if !self.fs.is_dir(&dir) {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = self
            .fs
            .read_dir(&dir)?
            .into_iter()
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(ext))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    fn read_record<T: DeserializeOwned>(
        &self,
        kind: &str,
        name: &str,
        missing: impl FnOnce(String) -> MountsyncError,
    ) -> Result<T> {
        let path = self.record_path(kind, name);
        if !self.fs.exists(&path) {
            return Err(missing(name.to_string()));
        }
        let contents = self.fs.read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn write_record<T: Serialize>(&self, kind: &str, name: &str, record: &T) -> Result<()> {
        let contents = toml::to_string(record)?;
        self.fs
            .write(&self.record_path(kind, name), contents.as_bytes())?;
        Ok(())
    }

    fn remove_record(
        &self,
        kind: &str,
        name: &str,
        missing: impl FnOnce(String) -> MountsyncError,
    ) -> Result<()> {
        let path = self.record_path(kind, name);
        if !self.fs.exists(&path) {
            return Err(missing(name.to_string()));
        }
        self.fs.remove_file(&path)?;
        Ok(())
    }

    fn read_settings(&self) -> Result<Settings> {
        let path = self.settings_path();
        if !self.fs.exists(&path) {
            return Ok(Settings::default());
        }
        Ok(toml::from_str(&self.fs.read_to_string(&path)?)?)
    }

    fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut settings = self.read_settings()?;
        f(&mut settings);
        let contents = toml::to_string(&settings)?;
        self.fs.write(&self.settings_path(), contents.as_bytes())?;
        Ok(())
    }
}

impl LocationStore for FileStore {
    fn list_local_locations(&self) -> Result<Vec<String>> {
        self.list_stems("local", RECORD_EXT)
    }

    fn read_local_location(&self, name: &str) -> Result<LocalLocationRecord> {
        self.read_record("local", name, MountsyncError::LocationDoesNotExist)
    }

    fn add_local_location(&self, name: &str, record: &LocalLocationRecord) -> Result<()> {
        self.write_record("local", name, record)
    }

    fn remove_local_location(&self, name: &str) -> Result<()> {
        self.remove_record("local", name, MountsyncError::LocationDoesNotExist)
    }

    fn list_remote_location_types(&self) -> Result<Vec<String>> {
        self.list_stems("remote_type", RECORD_EXT)
    }

    fn read_remote_location_type(&self, name: &str) -> Result<RemoteTypeRecord> {
        self.read_record(
            "remote_type",
            name,
            MountsyncError::RemoteLocationTypeDoesNotExist,
        )
    }

    fn add_remote_location_type(&self, name: &str, record: &RemoteTypeRecord) -> Result<()> {
        self.write_record("remote_type", name, record)
    }

    fn remove_remote_location_type(&self, name: &str) -> Result<()> {
        self.remove_record(
            "remote_type",
            name,
            MountsyncError::RemoteLocationTypeDoesNotExist,
        )
    }

    fn list_remote_locations(&self) -> Result<Vec<String>> {
        self.list_stems("remote", RECORD_EXT)
    }

    fn read_remote_location(&self, name: &str) -> Result<RemoteLocationRecord> {
        self.read_record("remote", name, MountsyncError::LocationDoesNotExist)
    }

    fn add_remote_location(&self, name: &str, record: &RemoteLocationRecord) -> Result<()> {
        self.write_record("remote", name, record)
    }

    fn remove_remote_location(&self, name: &str) -> Result<()> {
        self.remove_record("remote", name, MountsyncError::LocationDoesNotExist)
    }
}

impl TaskStore for FileStore {
    fn list_task_types(&self) -> Result<Vec<String>> {
        self.list_stems("task_type", RECORD_EXT)
    }

    fn read_task_type(&self, name: &str) -> Result<TaskTypeRecord> {
        self.read_record("task_type", name, MountsyncError::TaskTypeDoesNotExist)
    }

    fn add_task_type(&self, name: &str, record: &TaskTypeRecord) -> Result<()> {
        self.write_record("task_type", name, record)
    }

    fn remove_task_type(&self, name: &str) -> Result<()> {
        self.remove_record("task_type", name, MountsyncError::TaskTypeDoesNotExist)
    }

    fn list_tasks(&self) -> Result<Vec<String>> {
        self.list_stems("task", RECORD_EXT)
    }

    fn read_task(&self, name: &str) -> Result<TaskRecord> {
        self.read_record("task", name, MountsyncError::TaskDoesNotExist)
    }

    fn add_task(&self, name: &str, record: &TaskRecord) -> Result<()> {
        self.write_record("task", name, record)
    }

    fn remove_task(&self, name: &str) -> Result<()> {
        self.remove_record("task", name, MountsyncError::TaskDoesNotExist)
    }

    fn list_task_completed(&self, name: &str) -> Result<Vec<DateTime<Utc>>> {
        let path = self.completed_path(name);
        if !self.fs.exists(&path) {
            return Ok(Vec::new());
        }
        let contents = self.fs.read_to_string(&path)?;
        let mut times = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match from_key(line.trim()) {
                Ok(t) => times.push(t),
                Err(e) => warn!(task = %name, error = %e, "skipping unreadable completion record"),
            }
        }
        Ok(times)
    }

    fn add_task_completed(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        let line = format!("{}\n", to_key(at));
        self.fs
            .append(&self.completed_path(name), line.as_bytes())?;
        Ok(())
    }

    fn remove_task_completed(&self, name: &str) -> Result<()> {
        let path = self.completed_path(name);
        if self.fs.exists(&path) {
            self.fs.remove_file(&path)?;
        }
        Ok(())
    }
}

impl LogStore for FileStore {
    fn new_log_session(&self, key: DateTime<Utc>) -> Result<()> {
        let mut open = self.sessions();
        let path = self.log_path(key);
        if open.contains(&key) || self.fs.exists(&path) {
            return Err(MountsyncError::LogSessionAlreadyExists(to_key(key)));
        }
        self.fs.write(&path, b"")?;
        open.insert(key);
        Ok(())
    }

    fn list_log_sessions(&self) -> Result<Vec<DateTime<Utc>>> {
        Ok(self
            .list_stems("log", LOG_EXT)?
            .iter()
            .filter_map(|stem| from_key(stem).ok())
            .collect())
    }

    fn is_log_session_open(&self, key: DateTime<Utc>) -> bool {
        self.sessions().contains(&key)
    }

    fn read_log_session(&self, key: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, String)>> {
        let path = self.log_path(key);
        if !self.fs.exists(&path) {
            return Err(MountsyncError::LogSessionDoesNotExist(to_key(key)));
        }
        let contents = self.fs.read_to_string(&path)?;
        Ok(contents
            .lines()
            .filter_map(|line| {
                let (at, text) = line.split_once(LOG_TIME_SEP)?;
                Some((from_key(at).ok()?, text.to_string()))
            })
            .collect())
    }

    fn write_to_log_session(&self, key: DateTime<Utc>, line: &str) -> Result<()> {
        // Hold the session set so a concurrent close cannot interleave.
        let open = self.sessions();
        if !open.contains(&key) {
            return Err(MountsyncError::LogSessionDoesNotExist(to_key(key)));
        }
        let flat = line.replace(['\n', '\r'], " ");
        let entry = format!("{}{LOG_TIME_SEP}{flat}\n", to_key(crate::time::now()));
        self.fs.append(&self.log_path(key), entry.as_bytes())?;
        Ok(())
    }

    fn close_log_session(&self, key: DateTime<Utc>) -> Result<()> {
        if self.sessions().remove(&key) {
            Ok(())
        } else {
            Err(MountsyncError::LogSessionDoesNotExist(to_key(key)))
        }
    }

    fn delete_log_session(&self, key: DateTime<Utc>) -> Result<()> {
        let open = self.sessions();
        if open.contains(&key) {
            return Err(MountsyncError::LogSessionIsOpen(to_key(key)));
        }
        let path = self.log_path(key);
        if !self.fs.exists(&path) {
            return Err(MountsyncError::LogSessionDoesNotExist(to_key(key)));
        }
        self.fs.remove_file(&path)?;
        Ok(())
    }
}

impl FilelistStore for FileStore {
    fn list_filelists(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let mut lists = Vec::new();
        for stem in self.list_stems("filelist", LIST_EXT)? {
            let Some((location, key)) = stem.rsplit_once(FILELIST_SEP) else {
                warn!(file = %stem, "skipping file list with unexpected name");
                continue;
            };
            match from_key(key) {
                Ok(at) => lists.push((location.to_string(), at)),
                Err(e) => warn!(file = %stem, error = %e, "skipping file list with bad timestamp"),
            }
        }
        Ok(lists)
    }

    fn read_filelist(&self, location: &str, at: DateTime<Utc>) -> Result<Vec<String>> {
        let path = self.filelist_path(location, at);
        if !self.fs.exists(&path) {
            return Err(MountsyncError::FilelistDoesNotExist(format!(
                "{location}@{}",
                to_key(at)
            )));
        }
        Ok(self
            .fs
            .read_to_string(&path)?
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn add_filelist(&self, location: &str, at: DateTime<Utc>, files: &[String]) -> Result<()> {
        let mut contents = files.join("\n");
        contents.push('\n');
        self.fs
            .write(&self.filelist_path(location, at), contents.as_bytes())?;
        Ok(())
    }

    fn remove_filelist(&self, location: &str, at: DateTime<Utc>) -> Result<()> {
        let path = self.filelist_path(location, at);
        if !self.fs.exists(&path) {
            return Err(MountsyncError::FilelistDoesNotExist(format!(
                "{location}@{}",
                to_key(at)
            )));
        }
        self.fs.remove_file(&path)?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get_wait_time(&self) -> Result<Option<Duration>> {
        Ok(self.read_settings()?.wait_time_ms.map(Duration::from_millis))
    }

    fn set_wait_time(&self, wait: Duration) -> Result<()> {
        let ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self.update_settings(|s| s.wait_time_ms = Some(ms))
    }

    fn reset_wait_time(&self) -> Result<()> {
        self.update_settings(|s| s.wait_time_ms = None)
    }

    fn get_mount_folder(&self) -> Result<Option<String>> {
        Ok(self.read_settings()?.mount_folder)
    }

    fn set_mount_folder(&self, folder: &str) -> Result<()> {
        self.update_settings(|s| s.mount_folder = Some(folder.to_string()))
    }

    fn reset_mount_folder(&self) -> Result<()> {
        self.update_settings(|s| s.mount_folder = None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use chrono::TimeZone;

    fn store() -> FileStore {
        FileStore::with_file_system("/data", Arc::new(MockFileSystem::new())).unwrap()
    }

    fn at(nanos: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, nanos).unwrap()
    }

    #[test]
    fn records_round_trip_and_list_sorted() {
        let store = store();
        store
            .add_local_location("zeta", &LocalLocationRecord { path: "/z".into() })
            .unwrap();
        store
            .add_local_location("alpha", &LocalLocationRecord { path: "/a".into() })
            .unwrap();

        assert_eq!(store.list_local_locations().unwrap(), vec!["alpha", "zeta"]);
        assert_eq!(store.read_local_location("zeta").unwrap().path, "/z");

        store.remove_local_location("zeta").unwrap();
        assert!(matches!(
            store.read_local_location("zeta"),
            Err(MountsyncError::LocationDoesNotExist(_))
        ));
    }

    #[test]
    fn duplicate_completions_are_kept() {
        let store = store();
        store.add_task_completed("t", at(1)).unwrap();
        store.add_task_completed("t", at(2)).unwrap();
        store.add_task_completed("t", at(1)).unwrap();
        assert_eq!(
            store.list_task_completed("t").unwrap(),
            vec![at(1), at(2), at(1)]
        );

        store.remove_task_completed("t").unwrap();
        assert!(store.list_task_completed("t").unwrap().is_empty());
    }

    #[test]
    fn log_session_must_be_closed_before_delete() {
        let store = store();
        let key = at(7);
        store.new_log_session(key).unwrap();
        assert!(matches!(
            store.new_log_session(key),
            Err(MountsyncError::LogSessionAlreadyExists(_))
        ));

        store.write_to_log_session(key, "hello | world").unwrap();
        assert!(matches!(
            store.delete_log_session(key),
            Err(MountsyncError::LogSessionIsOpen(_))
        ));

        store.close_log_session(key).unwrap();
        assert!(store.write_to_log_session(key, "late").is_err());

        let lines = store.read_log_session(key).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].1, "hello | world");

        store.delete_log_session(key).unwrap();
        assert!(store.list_log_sessions().unwrap().is_empty());
    }

    #[test]
    fn filelists_are_listed_by_location_and_time() {
        let store = store();
        let files = vec!["/a/1".to_string(), "/a/2".to_string()];
        store.add_filelist("with---dashes", at(3), &files).unwrap();

        assert_eq!(
            store.list_filelists().unwrap(),
            vec![("with---dashes".to_string(), at(3))]
        );
        assert_eq!(store.read_filelist("with---dashes", at(3)).unwrap(), files);
    }

    #[test]
    fn settings_fall_back_to_none_after_reset() {
        let store = store();
        assert_eq!(store.get_wait_time().unwrap(), None);
        store.set_wait_time(Duration::from_secs(90)).unwrap();
        store.set_mount_folder("/mnt/x").unwrap();
        assert_eq!(store.get_wait_time().unwrap(), Some(Duration::from_secs(90)));

        store.reset_wait_time().unwrap();
        assert_eq!(store.get_wait_time().unwrap(), None);
        assert_eq!(store.get_mount_folder().unwrap().as_deref(), Some("/mnt/x"));
    }
}
