// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{MountsyncError, Result};
use crate::types::validate_name;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MountsyncError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_names(&raw)?;
        validate_templates(&raw)?;
        let wait_time = validate_wait_time(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, wait_time))
    }
}

fn config_error(msg: String) -> MountsyncError {
    MountsyncError::ConfigError(msg)
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    let sections = [
        ("remote_type", cfg.remote_type.keys().collect::<Vec<_>>()),
        ("location.local", cfg.location.local.keys().collect()),
        ("location.remote", cfg.location.remote.keys().collect()),
        ("task_type", cfg.task_type.keys().collect()),
        ("task", cfg.task.keys().collect()),
    ];
    for (section, names) in sections {
        for name in names {
            validate_name(name)
                .map_err(|_| config_error(format!("[{section}.{name}] has an invalid name")))?;
        }
    }

    for name in cfg.location.local.keys() {
        if cfg.location.remote.contains_key(name) {
            return Err(config_error(format!(
                "location '{name}' is defined as both local and remote"
            )));
        }
    }
    Ok(())
}

fn validate_templates(cfg: &RawConfigFile) -> Result<()> {
    for (name, remote_type) in cfg.remote_type.iter() {
        if remote_type.mount.trim().is_empty() || remote_type.unmount.trim().is_empty() {
            return Err(config_error(format!(
                "remote_type '{name}' needs non-empty mount and unmount commands"
            )));
        }
    }
    for (name, task_type) in cfg.task_type.iter() {
        if task_type.cmd.trim().is_empty() {
            return Err(config_error(format!("task_type '{name}' has an empty cmd")));
        }
    }
    for (name, loc) in cfg.location.local.iter() {
        if loc.path.trim().is_empty() {
            return Err(config_error(format!("local location '{name}' has an empty path")));
        }
    }
    for (name, task) in cfg.task.iter() {
        if task.src == task.dst {
            return Err(config_error(format!(
                "task '{name}' has the same source and destination '{}'",
                task.src
            )));
        }
    }
    Ok(())
}

fn validate_wait_time(cfg: &RawConfigFile) -> Result<std::time::Duration> {
    let wait = parse_duration(&cfg.config.wait_time)
        .map_err(|e| config_error(format!("[config].wait_time: {e}")))?;
    if wait.is_zero() {
        return Err(config_error("[config].wait_time must be greater than zero".to_string()));
    }
    Ok(wait)
}
