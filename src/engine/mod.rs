// src/engine/mod.rs

//! Scheduling engine for mountsync.
//!
//! The engine decides *when* tasks run:
//! - a timer that fires after the configured wait time and runs every task
//! - on-demand "run this task now" requests
//! - pause / resume
//! - shutdown
//!
//! The pure core state machine lives in [`core`]; the async/IO shell that
//! owns the timer, the event channel and the spawned workers is implemented
//! in [`runtime`].

use std::time::Duration;

use crate::types::TaskName;

/// Events flowing into the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The wait timer elapsed.
    TimerFired,
    /// Run one task as soon as the executor is free.
    RunNow(TaskName),
    /// Stop whatever is running and refuse new work.
    Pause,
    Resume,
    /// Applies from the next timer firing.
    SetWaitTime(Duration),
    /// A periodic pass over all tasks finished.
    PassFinished,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod runtime;

pub use self::core::{CoreCommand, CoreScheduler, CoreStep};
pub use self::runtime::{BackendFuture, Scheduler, SchedulerBackend, SchedulerHandle};
