#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use mountsync::config::{
    ConfigFile, LocalLocationConfig, RawConfigFile, RemoteLocationConfig, RemoteTypeConfig,
    TaskConfig, TaskTypeConfig,
};
use mountsync::exec::{Executor, Kernel};
use mountsync::fs::mock::MockFileSystem;
use mountsync::model::{Location, RemoteLocation, RemoteLocationType, TaskType};
use mountsync::store::{FileStore, MemoryStore};

use crate::commands::ScriptedLauncher;

pub const MOUNT_FOLDER: &str = "/mnt/sync";

pub fn smb_type() -> RemoteLocationType {
    RemoteLocationType {
        name: "smb".into(),
        mount: "mount //{address}/{remote} {mount} -o user={user},pass={password}".into(),
        unmount: "umount {mount}".into(),
    }
}

/// Remote location mounted at `MOUNT_FOLDER/<name>`.
pub fn remote_location(name: &str, address: &str) -> Location {
    Location::Remote(RemoteLocation {
        name: name.into(),
        remote_type: smb_type(),
        address: address.into(),
        username: "user".into(),
        password: "secret".into(),
        remote: "share".into(),
        mount_folder: MOUNT_FOLDER.into(),
    })
}

/// Task type whose work command is `sync <src> <dst>`.
pub fn sync_type() -> TaskType {
    TaskType::new("sync", "sync {src} {dst}")
}

/// Everything an executor test needs, wired to fakes.
pub struct ExecutorHarness {
    pub store: Arc<MemoryStore>,
    pub kernel: Arc<Kernel>,
    pub launcher: Arc<ScriptedLauncher>,
    pub fs: MockFileSystem,
    pub executor: Arc<Executor>,
}

impl ExecutorHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let kernel = Arc::new(Kernel::new());
        let launcher = ScriptedLauncher::new();
        let fs = MockFileSystem::new();
        let executor = Arc::new(Executor::with_file_system(
            kernel.clone(),
            launcher.clone(),
            Arc::new(fs.clone()),
        ));
        Self {
            store,
            kernel,
            launcher,
            fs,
            executor,
        }
    }

    /// Make `path` exist as a directory for file-list snapshots.
    pub fn dir(&self, path: &str) -> &Self {
        self.fs.add_dir(path);
        self
    }

    pub fn file(&self, path: &str) -> &Self {
        self.fs.add_file(path, "");
        self
    }
}

impl Default for ExecutorHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A `FileStore` rooted in a fresh temporary directory. Keep the `TempDir`
/// alive for as long as the store is used.
pub fn temp_file_store() -> (TempDir, FileStore) {
    let dir = tempfile::tempdir().expect("creating temp dir");
    let store = FileStore::open(dir.path()).expect("opening file store");
    (dir, store)
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn wait_time(mut self, wait: &str) -> Self {
        self.config.config.wait_time = wait.to_string();
        self
    }

    pub fn mount_folder(mut self, folder: &str) -> Self {
        self.config.config.mount_folder = folder.to_string();
        self
    }

    pub fn remote_type(mut self, name: &str, mount: &str, unmount: &str) -> Self {
        self.config.remote_type.insert(
            name.to_string(),
            RemoteTypeConfig {
                mount: mount.to_string(),
                unmount: unmount.to_string(),
            },
        );
        self
    }

    pub fn local(mut self, name: &str, path: &str) -> Self {
        self.config.location.local.insert(
            name.to_string(),
            LocalLocationConfig {
                path: path.to_string(),
            },
        );
        self
    }

    pub fn remote(mut self, name: &str, remote_type: &str, address: &str) -> Self {
        self.config.location.remote.insert(
            name.to_string(),
            RemoteLocationConfig {
                remote_type: remote_type.to_string(),
                address: address.to_string(),
                username: "user".to_string(),
                password: "secret".to_string(),
                remote: "share".to_string(),
            },
        );
        self
    }

    pub fn task_type(mut self, name: &str, cmd: &str) -> Self {
        self.config.task_type.insert(
            name.to_string(),
            TaskTypeConfig {
                cmd: cmd.to_string(),
            },
        );
        self
    }

    pub fn task(mut self, name: &str, src: &str, task_type: &str, dst: &str) -> Self {
        self.config.task.insert(
            name.to_string(),
            TaskConfig {
                src: src.to_string(),
                task_type: task_type.to_string(),
                dst: dst.to_string(),
            },
        );
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
