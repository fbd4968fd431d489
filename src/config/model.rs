// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// store_dir = "./mountsync-data"
/// wait_time = "1h"
/// mount_folder = "/mnt/mountsync"
///
/// [remote_type.smb]
/// mount = "mount -t cifs //{address}/{remote} {mount} -o username={user},password={password}"
/// unmount = "umount {mount}"
///
/// [location.local.photos]
/// path = "/home/me/photos"
///
/// [location.remote.nas]
/// remote_type = "smb"
/// address = "192.168.1.10"
/// username = "me"
/// password = "secret"
/// remote = "photos"
///
/// [task_type.mirror]
/// cmd = "rsync -a --delete {src}/ {dst}"
///
/// [task.photos-to-nas]
/// src = "photos"
/// task_type = "mirror"
/// dst = "nas"
/// ```
///
/// All sections are optional. This is the unvalidated form; see
/// [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub remote_type: BTreeMap<String, RemoteTypeConfig>,

    #[serde(default)]
    pub location: LocationSection,

    #[serde(default)]
    pub task_type: BTreeMap<String, TaskTypeConfig>,

    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Directory the file store keeps its records in.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Time between periodic passes, e.g. `"30m"` or `"1h"`.
    ///
    /// Overridden by a wait time persisted in the store.
    #[serde(default = "default_wait_time")]
    pub wait_time: String,

    /// Remote locations are mounted at `<mount_folder>/<name>`.
    #[serde(default = "default_mount_folder")]
    pub mount_folder: String,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("mountsync-data")
}

fn default_wait_time() -> String {
    "1h".to_string()
}

fn default_mount_folder() -> String {
    "/mnt/mountsync".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            wait_time: default_wait_time(),
            mount_folder: default_mount_folder(),
        }
    }
}

/// `[remote_type.<name>]`: mount and unmount command templates.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteTypeConfig {
    pub mount: String,
    pub unmount: String,
}

/// `[location.local.<name>]` and `[location.remote.<name>]`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LocationSection {
    #[serde(default)]
    pub local: BTreeMap<String, LocalLocationConfig>,

    #[serde(default)]
    pub remote: BTreeMap<String, RemoteLocationConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocalLocationConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteLocationConfig {
    pub remote_type: String,
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub remote: String,
}

/// `[task_type.<name>]`: work command template using `{src}` and `{dst}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TaskTypeConfig {
    pub cmd: String,
}

/// `[task.<name>]`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub src: String,
    pub task_type: String,
    pub dst: String,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means
/// names are valid and the wait time parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub store_dir: PathBuf,
    pub wait_time: Duration,
    pub mount_folder: String,
    pub remote_type: BTreeMap<String, RemoteTypeConfig>,
    pub location: LocationSection,
    pub task_type: BTreeMap<String, TaskTypeConfig>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, wait_time: Duration) -> Self {
        Self {
            store_dir: raw.config.store_dir,
            wait_time,
            mount_folder: raw.config.mount_folder,
            remote_type: raw.remote_type,
            location: raw.location,
            task_type: raw.task_type,
            task: raw.task,
        }
    }
}
