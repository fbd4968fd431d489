// src/engine/core.rs

//! Pure core scheduler state machine.
//!
//! [`CoreScheduler::step`] consumes one [`SchedulerEvent`] and returns the
//! commands the IO shell (`engine::runtime::Scheduler`) should carry out. It
//! has no channels, no Tokio types, and does not perform any IO, so it is
//! unit tested directly.

use std::time::Duration;

use tracing::debug;

use crate::types::TaskName;

use super::SchedulerEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Run every task once, sequentially, on a background worker.
    RunAll,
    RunTask(TaskName),
    StopAndBlock,
    Unblock,
    /// Arm the wait timer for this long.
    Rearm(Duration),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn run(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreScheduler {
    wait_time: Duration,
    /// A periodic pass is still working through the task list.
    pass_running: bool,
    paused: bool,
}

impl CoreScheduler {
    pub fn new(wait_time: Duration) -> Self {
        Self {
            wait_time,
            pass_running: false,
            paused: false,
        }
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    pub fn pass_running(&self) -> bool {
        self.pass_running
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn step(&mut self, event: SchedulerEvent) -> CoreStep {
        match event {
            SchedulerEvent::TimerFired => {
                let mut commands = Vec::new();
                if self.pass_running {
                    // Tasks of the previous pass are still queued on the
                    // executor; a second pass would only repeat them.
                    debug!("previous pass still running; skipping this one");
                } else {
                    self.pass_running = true;
                    commands.push(CoreCommand::RunAll);
                }
                commands.push(CoreCommand::Rearm(self.wait_time));
                CoreStep::run(commands)
            }
            SchedulerEvent::PassFinished => {
                self.pass_running = false;
                CoreStep::run(Vec::new())
            }
            SchedulerEvent::RunNow(task) => CoreStep::run(vec![CoreCommand::RunTask(task)]),
            SchedulerEvent::Pause => {
                self.paused = true;
                CoreStep::run(vec![CoreCommand::StopAndBlock])
            }
            SchedulerEvent::Resume => {
                self.paused = false;
                CoreStep::run(vec![CoreCommand::Unblock])
            }
            SchedulerEvent::SetWaitTime(wait) => {
                self.wait_time = wait;
                CoreStep::run(Vec::new())
            }
            SchedulerEvent::ShutdownRequested => CoreStep {
                commands: vec![CoreCommand::StopAndBlock],
                keep_running: false,
            },
        }
    }
}
