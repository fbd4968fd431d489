// src/model/mod.rs

//! Locations, tasks and file lists.

pub mod filelist;
pub mod location;
pub mod task;

pub use filelist::{diffs_per_location, snapshot, Diff};
pub use location::{LocalLocation, Location, Locations, RemoteLocation, RemoteLocationType};
pub use task::{Task, TaskType, Tasks};
