use std::sync::{Arc, Mutex};
use std::time::Duration;

use mountsync::engine::runtime::{BackendFuture, SchedulerBackend};
use mountsync::errors::Result;
use mountsync::types::TaskName;

use crate::commands::Gate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    RunAllStarted,
    RunAllFinished,
    RunTask(TaskName),
    StopAndBlock,
    WaitIdle,
    Unblock,
    SetWaitTime(Duration),
}

/// A fake scheduler backend that:
/// - records every call in order
/// - optionally holds `run_all` until a gate opens, to simulate a slow pass
/// - keeps a wait time that tests may change behind the scheduler's back.
#[derive(Debug)]
pub struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    pass_gate: Option<Gate>,
    blocked: Mutex<bool>,
    wait: Mutex<Duration>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            pass_gate: None,
            blocked: Mutex::new(false),
            wait: Mutex::new(Duration::from_secs(3600)),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_pass_gate(gate: Gate) -> Arc<Self> {
        Arc::new(Self {
            pass_gate: Some(gate),
            ..Self::default()
        })
    }

    /// Change the wait time without going through the scheduler.
    pub fn set_wait(&self, wait: Duration) {
        *self.wait.lock().unwrap() = wait;
    }

    pub fn blocked(&self) -> bool {
        *self.blocked.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &BackendCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn push(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SchedulerBackend for FakeBackend {
    fn run_all(&self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.push(BackendCall::RunAllStarted);
            if let Some(gate) = &self.pass_gate {
                gate.wait().await;
            }
            self.push(BackendCall::RunAllFinished);
        })
    }

    fn run_task(&self, task: TaskName) -> BackendFuture<'_> {
        Box::pin(async move { self.push(BackendCall::RunTask(task)) })
    }

    fn stop_and_block(&self) {
        *self.blocked.lock().unwrap() = true;
        self.push(BackendCall::StopAndBlock);
    }

    fn wait_idle(&self) -> BackendFuture<'_> {
        Box::pin(async move { self.push(BackendCall::WaitIdle) })
    }

    fn unblock(&self) {
        *self.blocked.lock().unwrap() = false;
        self.push(BackendCall::Unblock);
    }

    fn wait_time(&self) -> Duration {
        *self.wait.lock().unwrap()
    }

    fn set_wait_time(&self, wait: Duration) -> Result<()> {
        self.set_wait(wait);
        self.push(BackendCall::SetWaitTime(wait));
        Ok(())
    }
}
