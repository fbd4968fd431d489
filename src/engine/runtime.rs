// src/engine/runtime.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, Sleep};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::service::SyncService;
use crate::types::TaskName;

use super::core::{CoreCommand, CoreScheduler};
use super::SchedulerEvent;

/// Boxed future returned by [`SchedulerBackend`] operations.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// What the scheduler drives.
///
/// Production code uses [`SyncService`]; tests provide a recording fake so
/// the loop can be exercised without an executor.
pub trait SchedulerBackend: Send + Sync + 'static {
    /// Run every task once, one after another.
    fn run_all(&self) -> BackendFuture<'_>;

    fn run_task(&self, task: TaskName) -> BackendFuture<'_>;

    /// Block new runs and stop the registered command. The block is in
    /// place when this returns.
    fn stop_and_block(&self);

    /// Resolves once in-flight work has quiesced.
    fn wait_idle(&self) -> BackendFuture<'_>;

    fn unblock(&self);

    /// Interval between passes. Read again every time the timer fires.
    fn wait_time(&self) -> Duration;

    fn set_wait_time(&self, wait: Duration) -> Result<()>;
}

impl SchedulerBackend for SyncService {
    fn run_all(&self) -> BackendFuture<'_> {
        Box::pin(SyncService::run_all(self))
    }

    fn run_task(&self, task: TaskName) -> BackendFuture<'_> {
        Box::pin(async move {
            if let Err(e) = SyncService::run_task(self, &task).await {
                warn!(task = %task, error = %e, "run-now request failed");
            }
        })
    }

    fn stop_and_block(&self) {
        SyncService::block(self);
    }

    fn wait_idle(&self) -> BackendFuture<'_> {
        Box::pin(SyncService::wait_idle(self))
    }

    fn unblock(&self) {
        SyncService::unblock(self);
    }

    fn wait_time(&self) -> Duration {
        SyncService::wait_time(self)
    }

    fn set_wait_time(&self, wait: Duration) -> Result<()> {
        SyncService::set_wait_time(self, wait)
    }
}

/// Cloneable sender for requests to a running [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerEvent>,
}

impl SchedulerHandle {
    pub async fn send(&self, event: SchedulerEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow!("scheduler has stopped").into())
    }

    pub async fn run_now(&self, task: impl Into<TaskName>) -> Result<()> {
        self.send(SchedulerEvent::RunNow(task.into())).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(SchedulerEvent::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(SchedulerEvent::Resume).await
    }

    pub async fn set_wait_time(&self, wait: Duration) -> Result<()> {
        self.send(SchedulerEvent::SetWaitTime(wait)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SchedulerEvent::ShutdownRequested).await
    }
}

/// Async shell around [`CoreScheduler`].
///
/// Owns the wait timer and the event channel, and spawns the work the core
/// asks for. The loop never waits for a task, so pause and resume requests
/// are handled while a task is running. Blocking and unblocking happen on
/// the loop itself, in the order the requests arrived.
pub struct Scheduler {
    core: CoreScheduler,
    backend: Arc<dyn SchedulerBackend>,
    event_tx: mpsc::Sender<SchedulerEvent>,
    event_rx: mpsc::Receiver<SchedulerEvent>,
    workers: JoinSet<()>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("core", &self.core)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(core: CoreScheduler, backend: Arc<dyn SchedulerBackend>) -> (Self, SchedulerHandle) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let handle = SchedulerHandle {
            tx: event_tx.clone(),
        };
        let scheduler = Self {
            core,
            backend,
            event_tx,
            event_rx,
            workers: JoinSet::new(),
        };
        (scheduler, handle)
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.event_tx.clone(),
        }
    }

    /// Main event loop. Returns after a shutdown request once every spawned
    /// worker has finished.
    pub async fn run(mut self) -> Result<()> {
        info!(wait_time = ?self.core.wait_time(), "mountsync scheduler started");

        let timer = time::sleep(self.core.wait_time());
        tokio::pin!(timer);

        loop {
            let event = tokio::select! {
                () = &mut timer => SchedulerEvent::TimerFired,
                event = self.event_rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("scheduler event channel closed; exiting");
                        break;
                    }
                },
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "scheduler worker failed");
                    }
                    continue;
                }
            };

            debug!(?event, "scheduler received event");

            match &event {
                SchedulerEvent::SetWaitTime(wait) => {
                    if let Err(e) = self.backend.set_wait_time(*wait) {
                        warn!(wait_time = ?wait, error = %e, "wait time not changed");
                        continue;
                    }
                }
                SchedulerEvent::TimerFired => {
                    // The backend may have been changed behind the loop's back.
                    self.core.step(SchedulerEvent::SetWaitTime(self.backend.wait_time()));
                }
                _ => {}
            }

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command, timer.as_mut());
            }

            if !step.keep_running {
                info!("shutdown requested; stopping scheduler");
                break;
            }
        }

        // Workers may still try to report a finished pass.
        drop(self.event_rx);
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "scheduler worker failed");
            }
        }

        info!("scheduler exiting");
        Ok(())
    }

    fn execute_command(&mut self, command: CoreCommand, timer: Pin<&mut Sleep>) {
        match command {
            CoreCommand::RunAll => {
                let backend = self.backend.clone();
                let tx = self.event_tx.clone();
                self.workers.spawn(async move {
                    backend.run_all().await;
                    if tx.send(SchedulerEvent::PassFinished).await.is_err() {
                        debug!("scheduler gone before pass finished");
                    }
                });
            }
            CoreCommand::RunTask(task) => {
                let backend = self.backend.clone();
                self.workers.spawn(async move { backend.run_task(task).await });
            }
            CoreCommand::StopAndBlock => {
                self.backend.stop_and_block();
                let backend = self.backend.clone();
                self.workers.spawn(async move { backend.wait_idle().await });
            }
            CoreCommand::Unblock => self.backend.unblock(),
            CoreCommand::Rearm(wait) => {
                debug!(wait_time = ?wait, "rearming timer");
                timer.reset(Instant::now() + wait);
            }
        }
    }
}
