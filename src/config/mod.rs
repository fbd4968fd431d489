// src/config/mod.rs

//! Configuration loading and validation for mountsync.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate names, templates and durations (`validate.rs`).
//! - Seed configured entries into the store (`seed.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod seed;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ConfigSection, LocalLocationConfig, LocationSection, RawConfigFile,
    RemoteLocationConfig, RemoteTypeConfig, TaskConfig, TaskTypeConfig,
};
pub use seed::{seed_store, SeedReport};
