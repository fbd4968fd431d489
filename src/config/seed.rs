// src/config/seed.rs

//! Copy configured entries into the store.
//!
//! The store is the source of truth once an entry exists in it: entries
//! already present are left alone, so edits made at runtime survive a
//! restart with an unchanged config file.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::model::ConfigFile;
use crate::errors::{MountsyncError, Result};
use crate::store::{
    LocalLocationRecord, RemoteLocationRecord, RemoteTypeRecord, Store, TaskRecord, TaskTypeRecord,
};

/// Entries written to and skipped by [`seed_store`], as `section.name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub added: Vec<String>,
    pub kept: Vec<String>,
}

impl SeedReport {
    fn record(&mut self, added: bool, section: &str, name: &str) {
        let entry = format!("{section}.{name}");
        if added {
            debug!(entry = %entry, "seeded from config");
            self.added.push(entry);
        } else {
            self.kept.push(entry);
        }
    }
}

pub fn seed_store(cfg: &ConfigFile, store: &dyn Store) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let remote_types: BTreeSet<String> = store.list_remote_location_types()?.into_iter().collect();
    for (name, rt) in cfg.remote_type.iter() {
        let add = !remote_types.contains(name);
        if add {
            store.add_remote_location_type(
                name,
                &RemoteTypeRecord {
                    mount: rt.mount.clone(),
                    unmount: rt.unmount.clone(),
                },
            )?;
        }
        report.record(add, "remote_type", name);
    }

    let task_types: BTreeSet<String> = store.list_task_types()?.into_iter().collect();
    for (name, tt) in cfg.task_type.iter() {
        let add = !task_types.contains(name);
        if add {
            store.add_task_type(name, &TaskTypeRecord { cmd: tt.cmd.clone() })?;
        }
        report.record(add, "task_type", name);
    }

    let mut locations: BTreeSet<String> = store.list_local_locations()?.into_iter().collect();
    locations.extend(store.list_remote_locations()?);

    for (name, loc) in cfg.location.local.iter() {
        let add = !locations.contains(name);
        if add {
            store.add_local_location(name, &LocalLocationRecord { path: loc.path.clone() })?;
        }
        report.record(add, "location.local", name);
    }

    let remote_types: BTreeSet<String> = store.list_remote_location_types()?.into_iter().collect();
    for (name, loc) in cfg.location.remote.iter() {
        let add = !locations.contains(name);
        if add {
            if !remote_types.contains(&loc.remote_type) {
                return Err(MountsyncError::ConfigError(format!(
                    "remote location '{name}' uses unknown remote_type '{}'",
                    loc.remote_type
                )));
            }
            store.add_remote_location(
                name,
                &RemoteLocationRecord {
                    remote_type: loc.remote_type.clone(),
                    address: loc.address.clone(),
                    username: loc.username.clone(),
                    password: loc.password.clone(),
                    remote: loc.remote.clone(),
                },
            )?;
        }
        report.record(add, "location.remote", name);
    }

    let mut locations: BTreeSet<String> = store.list_local_locations()?.into_iter().collect();
    locations.extend(store.list_remote_locations()?);
    let task_types: BTreeSet<String> = store.list_task_types()?.into_iter().collect();
    let tasks: BTreeSet<String> = store.list_tasks()?.into_iter().collect();

    for (name, task) in cfg.task.iter() {
        let add = !tasks.contains(name);
        if add {
            for endpoint in [&task.src, &task.dst] {
                if !locations.contains(endpoint) {
                    return Err(MountsyncError::ConfigError(format!(
                        "task '{name}' references unknown location '{endpoint}'"
                    )));
                }
            }
            if !task_types.contains(&task.task_type) {
                return Err(MountsyncError::ConfigError(format!(
                    "task '{name}' uses unknown task_type '{}'",
                    task.task_type
                )));
            }
            store.add_task(
                name,
                &TaskRecord {
                    src: task.src.clone(),
                    task_type: task.task_type.clone(),
                    dst: task.dst.clone(),
                },
            )?;
        }
        report.record(add, "task", name);
    }

    info!(
        added = report.added.len(),
        kept = report.kept.len(),
        "config seeded into store"
    );
    Ok(report)
}
