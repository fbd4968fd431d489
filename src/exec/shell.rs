// src/exec/shell.rs

//! External commands backed by real processes (`tokio::process`).

use std::mem;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::{MountsyncError, Result};
use crate::logs::Log;

use super::command::{CommandFuture, CommandLauncher, CommandSpec, ExternalCommand};

enum RunState {
    Idle,
    Running(oneshot::Sender<()>),
    /// Stop was requested. A run that has not started yet fails immediately.
    Stopped,
}

/// A [`CommandSpec`] executed as a child process.
///
/// Both pipes are read line by line; every line goes to the log and into the
/// captured output, interleaved in the order the lines arrived. A non-zero
/// exit status is an error.
pub struct ShellCommand {
    spec: CommandSpec,
    state: Mutex<RunState>,
}

impl ShellCommand {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_inner(&self, log: &dyn Log) -> Result<String> {
        let cancel_rx = {
            let mut state = self.lock();
            match *state {
                RunState::Stopped => return Err(MountsyncError::Stopped(self.spec.to_string())),
                RunState::Running(_) => {
                    return Err(MountsyncError::AlreadyRunning(self.spec.to_string()));
                }
                RunState::Idle => {}
            }
            let (tx, rx) = oneshot::channel();
            *state = RunState::Running(tx);
            rx
        };

        let result = self.execute(log, cancel_rx).await;

        {
            let mut state = self.lock();
            if matches!(*state, RunState::Running(_)) {
                *state = RunState::Idle;
            }
        }

        result
    }

    async fn execute(&self, log: &dyn Log, mut cancel_rx: oneshot::Receiver<()>) -> Result<String> {
        log.run(&self.spec);
        info!(command = %self.spec, "starting external command");

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", self.spec))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let captured = Mutex::new(Vec::new());

        // Either the process exits on its own, or a stop request arrives and
        // the child is killed.
        let finished = tokio::select! {
            status = async {
                tokio::join!(pump(stdout, log, &captured), pump(stderr, log, &captured));
                child.wait().await
            } => Some(status),
            _ = &mut cancel_rx => None,
        };

        let Some(status) = finished else {
            info!(command = %self.spec, "stop requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(command = %self.spec, error = %e, "failed to kill child process");
                log.error(&e);
            }
            return Err(MountsyncError::Stopped(self.spec.to_string()));
        };

        let status = status.with_context(|| format!("waiting for {}", self.spec))?;
        let code = status.code().unwrap_or(-1);
        debug!(command = %self.spec, exit_code = code, "external command exited");

        if !status.success() {
            return Err(MountsyncError::CommandFailed {
                command: self.spec.to_string(),
                code,
            });
        }

        let out = captured.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok(out.join("\n"))
    }
}

/// Copy lines from `reader` to the log and onto the shared `captured` list.
async fn pump<R>(reader: Option<R>, log: &dyn Log, captured: &Mutex<Vec<String>>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                log.output(&line);
                captured
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(line);
            }
            Ok(None) => break,
            Err(e) => {
                log.error(&e);
                break;
            }
        }
    }
}

impl ExternalCommand for ShellCommand {
    fn describe(&self) -> String {
        self.spec.to_string()
    }

    fn run<'a>(&'a self, log: &'a dyn Log) -> CommandFuture<'a> {
        Box::pin(self.run_inner(log))
    }

    fn stop(&self, log: &dyn Log) {
        let previous = mem::replace(&mut *self.lock(), RunState::Stopped);
        if let RunState::Running(tx) = previous {
            if tx.send(()).is_err() {
                debug!(command = %self.spec, "process already finished while stopping");
            }
            log.write(&format!("Stopping {}", self.spec));
        }
    }
}

/// Launches every command as a [`ShellCommand`].
#[derive(Debug, Clone, Default)]
pub struct ShellLauncher;

impl CommandLauncher for ShellLauncher {
    fn launch(&self, spec: CommandSpec) -> Arc<dyn ExternalCommand> {
        Arc::new(ShellCommand::new(spec))
    }
}
