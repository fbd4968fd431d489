// src/model/location.rs

//! Places files live.
//!
//! A [`Location`] is either a plain local directory or a remote share that
//! has to be found on the network and mounted under the mount folder before
//! anything can touch it. Local locations have no probe, prepare, mount or
//! unmount commands; every predicate is trivially true for them.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::errors::{MountsyncError, Result};
use crate::exec::CommandSpec;
use crate::logs::Log;
use crate::store::{LocalLocationRecord, LocationStore, RemoteLocationRecord, RemoteTypeRecord};
use crate::types::{validate_name, LocationName};

/// Mount/unmount command templates for one kind of remote share.
///
/// Templates may use `{user}`, `{password}`, `{address}`, `{remote}` and
/// `{mount}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocationType {
    pub name: String,
    pub mount: String,
    pub unmount: String,
}

impl RemoteLocationType {
    fn record(&self) -> RemoteTypeRecord {
        RemoteTypeRecord {
            mount: self.mount.clone(),
            unmount: self.unmount.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLocation {
    pub name: LocationName,
    pub path: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub name: LocationName,
    pub remote_type: RemoteLocationType,
    pub address: String,
    pub username: String,
    pub password: String,
    pub remote: String,
    pub mount_folder: String,
}

impl fmt::Debug for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLocation")
            .field("name", &self.name)
            .field("remote_type", &self.remote_type.name)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<censored>")
            .field("remote", &self.remote)
            .field("mount_folder", &self.mount_folder)
            .finish()
    }
}

impl RemoteLocation {
    pub fn mount_point(&self) -> String {
        format!("{}/{}", self.mount_folder.trim_end_matches('/'), self.name)
    }

    fn template_vars(&self) -> [(&'static str, String); 5] {
        [
            ("user", self.username.clone()),
            ("password", self.password.clone()),
            ("address", self.address.clone()),
            ("remote", self.remote.clone()),
            ("mount", self.mount_point()),
        ]
    }

    fn render(&self, template: &str) -> Option<CommandSpec> {
        let vars = self.template_vars();
        let borrowed: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        CommandSpec::from_template(template, &borrowed)
    }

    fn record(&self) -> RemoteLocationRecord {
        RemoteLocationRecord {
            remote_type: self.remote_type.name.clone(),
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            remote: self.remote.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(LocalLocation),
    Remote(RemoteLocation),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(l) => write!(f, "{}=LOCAL:{}", l.name, l.path),
            Location::Remote(r) => write!(
                f,
                "{}=REMOTE:{}_{}//{}",
                r.name, r.address, r.remote_type.name, r.remote
            ),
        }
    }
}

impl Location {
    pub fn local(name: impl Into<String>, path: impl Into<String>) -> Self {
        Location::Local(LocalLocation {
            name: name.into(),
            path: path.into(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Location::Local(l) => &l.name,
            Location::Remote(r) => &r.name,
        }
    }

    /// Filesystem root of the location on this machine.
    pub fn local_path(&self) -> String {
        match self {
            Location::Local(l) => l.path.clone(),
            Location::Remote(r) => r.mount_point(),
        }
    }

    /// Probe for whether the location can be reached right now.
    pub fn located_command(&self) -> Option<CommandSpec> {
        match self {
            Location::Local(_) => None,
            Location::Remote(r) => Some(CommandSpec::new("nmap", ["-sP", r.address.as_str()])),
        }
    }

    pub fn located(&self, log: &dyn Log, output: &str) -> bool {
        match self {
            Location::Local(_) => true,
            Location::Remote(_) => {
                let up = output.contains("Host is up");
                if !up {
                    log.write(&format!("Cannot locate {self}"));
                }
                up
            }
        }
    }

    /// Probe for whether the mount point exists.
    pub fn prepared_command(&self) -> Option<CommandSpec> {
        match self {
            Location::Local(_) => None,
            Location::Remote(r) => Some(CommandSpec::new("ls", [r.mount_point()])),
        }
    }

    pub fn prepared(&self, _log: &dyn Log, output: &str) -> bool {
        match self {
            Location::Local(_) => true,
            Location::Remote(_) => !output.contains("No such file or directory"),
        }
    }

    /// Create the mount point.
    pub fn prepare_command(&self) -> Option<CommandSpec> {
        match self {
            Location::Local(_) => None,
            Location::Remote(r) => Some(CommandSpec::new("mkdir", ["-p".to_string(), r.mount_point()])),
        }
    }

    pub fn mount_command(&self) -> Option<CommandSpec> {
        match self {
            Location::Local(_) => None,
            Location::Remote(r) => r.render(&r.remote_type.mount).map(CommandSpec::censored),
        }
    }

    pub fn umount_command(&self) -> Option<CommandSpec> {
        match self {
            Location::Local(_) => None,
            Location::Remote(r) => r.render(&r.remote_type.unmount),
        }
    }

    fn save(&self, store: &dyn LocationStore) -> Result<()> {
        match self {
            Location::Local(l) => store.add_local_location(
                &l.name,
                &LocalLocationRecord {
                    path: l.path.clone(),
                },
            ),
            Location::Remote(r) => store.add_remote_location(&r.name, &r.record()),
        }
    }

    fn delete(&self, store: &dyn LocationStore) -> Result<()> {
        match self {
            Location::Local(l) => store.remove_local_location(&l.name),
            Location::Remote(r) => store.remove_remote_location(&r.name),
        }
    }
}

/// All remote location types known to the store.
pub fn list_remote_location_types(store: &dyn LocationStore) -> Result<Vec<RemoteLocationType>> {
    store
        .list_remote_location_types()?
        .into_iter()
        .map(|name| {
            let record = store.read_remote_location_type(&name)?;
            Ok(RemoteLocationType {
                name,
                mount: record.mount,
                unmount: record.unmount,
            })
        })
        .collect()
}

pub fn add_remote_location_type(
    store: &dyn LocationStore,
    remote_type: &RemoteLocationType,
) -> Result<()> {
    validate_name(&remote_type.name)?;
    store.add_remote_location_type(&remote_type.name, &remote_type.record())
}

/// Registry of locations keyed by their unique name.
#[derive(Debug, Clone, Default)]
pub struct Locations {
    entries: BTreeMap<LocationName, Location>,
}

impl FromIterator<Location> for Locations {
    fn from_iter<I: IntoIterator<Item = Location>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|loc| (loc.name().to_string(), loc))
                .collect(),
        }
    }
}

impl Locations {
    /// Build the registry from the store.
    ///
    /// Entries that cannot be read, or that reference an unknown remote
    /// type, are logged and skipped rather than failing startup.
    pub fn load(store: &dyn LocationStore, mount_folder: &str, log: &dyn Log) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for name in store.list_local_locations()? {
            match store.read_local_location(&name) {
                Ok(record) => {
                    let loc = Location::local(name.clone(), record.path);
                    log.write(&format!("Location configured: {loc}"));
                    entries.insert(name, loc);
                }
                Err(e) => log.error(&e),
            }
        }

        let types = list_remote_location_types(store)?;
        for name in store.list_remote_locations()? {
            let record = match store.read_remote_location(&name) {
                Ok(record) => record,
                Err(e) => {
                    log.error(&e);
                    continue;
                }
            };
            let Some(remote_type) = types.iter().find(|t| t.name == record.remote_type) else {
                log.error(&MountsyncError::RemoteLocationTypeDoesNotExist(
                    record.remote_type.clone(),
                ));
                continue;
            };
            let loc = Location::Remote(RemoteLocation {
                name: name.clone(),
                remote_type: remote_type.clone(),
                address: record.address,
                username: record.username,
                password: record.password,
                remote: record.remote,
                mount_folder: mount_folder.to_string(),
            });
            log.write(&format!("Location configured: {loc}"));
            entries.insert(name, loc);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<LocationName> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist and register a new location. Names are unique.
    pub fn add(&mut self, store: &dyn LocationStore, loc: Location) -> Result<()> {
        validate_name(loc.name())?;
        if self.entries.contains_key(loc.name()) {
            return Err(MountsyncError::LocationAlreadyExists(loc.name().to_string()));
        }
        loc.save(store)?;
        debug!(location = %loc.name(), "location added");
        self.entries.insert(loc.name().to_string(), loc);
        Ok(())
    }

    /// Delete a location from the store and the registry.
    ///
    /// Callers are responsible for refusing to remove a location that a task
    /// still references.
    pub fn remove(&mut self, store: &dyn LocationStore, name: &str) -> Result<Location> {
        let Some(loc) = self.entries.get(name) else {
            return Err(MountsyncError::LocationDoesNotExist(name.to_string()));
        };
        loc.delete(store)?;
        debug!(location = %name, "location removed");
        self.entries
            .remove(name)
            .ok_or_else(|| MountsyncError::LocationDoesNotExist(name.to_string()))
    }
}
