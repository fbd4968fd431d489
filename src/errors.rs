// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MountsyncError {
    /// The kernel is blocked; ordinary runs are refused until it is unblocked.
    #[error("Kernel is paused")]
    Paused,

    #[error("Command was stopped: {0}")]
    Stopped(String),

    #[error("Command {command} failed with exit code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Command is already running: {0}")]
    AlreadyRunning(String),

    #[error("Location does not exist: {0}")]
    LocationDoesNotExist(String),

    #[error("Location already exists: {0}")]
    LocationAlreadyExists(String),

    #[error("Location {location} is used by task {task}")]
    LocationInUse { location: String, task: String },

    #[error("Remote location type does not exist: {0}")]
    RemoteLocationTypeDoesNotExist(String),

    #[error("Task already exists: {0}")]
    TaskAlreadyExists(String),

    #[error("Task does not exist: {0}")]
    TaskDoesNotExist(String),

    #[error("Task type does not exist: {0}")]
    TaskTypeDoesNotExist(String),

    #[error("Log session already exists: {0}")]
    LogSessionAlreadyExists(String),

    #[error("Log session does not exist: {0}")]
    LogSessionDoesNotExist(String),

    #[error("Log session is open, it cannot be deleted: {0}")]
    LogSessionIsOpen(String),

    #[error("File list does not exist: {0}")]
    FilelistDoesNotExist(String),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Invalid timestamp key: {0}")]
    InvalidTimestamp(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MountsyncError {
    /// Whether this error is the distinguished "kernel is paused" value.
    pub fn is_paused(&self) -> bool {
        matches!(self, MountsyncError::Paused)
    }

    /// Paused before starting, or stopped while running.
    pub fn is_interruption(&self) -> bool {
        matches!(self, MountsyncError::Paused | MountsyncError::Stopped(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MountsyncError>;
