//! Scripted external commands, so kernel and executor tests never spawn
//! `mount`, `nmap` or `rsync`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use mountsync::errors::MountsyncError;
use mountsync::exec::{CommandFuture, CommandLauncher, CommandSpec, ExternalCommand};
use mountsync::logs::Log;

/// A latch commands can wait on. Opening it releases every waiter, present
/// and future, until it is closed again.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn close(&self) {
        self.tx.send_replace(false);
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// What a scripted command does when run.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Succeed immediately with this output.
    Output(String),
    /// Exit with this non-zero code.
    Fail(i32),
    /// Succeed with empty output once the gate opens.
    Block(Gate),
    /// Succeed with empty output after sleeping.
    Sleep(Duration),
}

impl Behaviour {
    pub fn output(text: &str) -> Self {
        Behaviour::Output(text.to_string())
    }
}

#[derive(Debug, Default)]
struct Journal {
    runs: Mutex<Vec<CommandSpec>>,
    finished: Mutex<Vec<(CommandSpec, bool)>>,
    stops: Mutex<Vec<CommandSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Journal {
    fn started(&self, spec: &CommandSpec) {
        self.runs.lock().unwrap().push(spec.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn finished(&self, spec: &CommandSpec, ok: bool) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push((spec.clone(), ok));
    }
}

/// One scripted invocation.
pub struct ScriptedCommand {
    spec: CommandSpec,
    behaviour: Behaviour,
    journal: Arc<Journal>,
    stopped: watch::Sender<bool>,
}

impl ScriptedCommand {
    async fn run_inner(&self, log: &dyn Log) -> mountsync::errors::Result<String> {
        log.run(&self.spec);
        self.journal.started(&self.spec);

        let mut stopped = self.stopped.subscribe();
        let stop = async move {
            let _ = stopped.wait_for(|s| *s).await;
        };

        let result = match &self.behaviour {
            Behaviour::Output(out) => Ok(out.clone()),
            Behaviour::Fail(code) => Err(MountsyncError::CommandFailed {
                command: self.spec.to_string(),
                code: *code,
            }),
            Behaviour::Block(gate) => tokio::select! {
                () = gate.wait() => Ok(String::new()),
                () = stop => Err(MountsyncError::Stopped(self.spec.to_string())),
            },
            Behaviour::Sleep(d) => tokio::select! {
                () = tokio::time::sleep(*d) => Ok(String::new()),
                () = stop => Err(MountsyncError::Stopped(self.spec.to_string())),
            },
        };

        self.journal.finished(&self.spec, result.is_ok());
        result
    }
}

impl ExternalCommand for ScriptedCommand {
    fn describe(&self) -> String {
        self.spec.to_string()
    }

    fn run<'a>(&'a self, log: &'a dyn Log) -> CommandFuture<'a> {
        Box::pin(self.run_inner(log))
    }

    fn stop(&self, _log: &dyn Log) {
        self.stopped.send_replace(true);
        self.journal.stops.lock().unwrap().push(self.spec.clone());
    }
}

impl ScriptedCommand {
    /// A command outside any launcher, for driving the kernel directly.
    pub fn standalone(program: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            spec: CommandSpec::new(program, Vec::<String>::new()),
            behaviour,
            journal: Arc::default(),
            stopped: watch::Sender::new(false),
        })
    }

    pub fn was_stopped(&self) -> bool {
        *self.stopped.borrow()
    }
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    arg: Option<String>,
    behaviour: Behaviour,
}

/// Launcher whose commands follow per-program rules and record every run.
///
/// Programs without a rule succeed with empty output. When several rules
/// match, the one added last wins.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    rules: Mutex<Vec<Rule>>,
    journal: Arc<Journal>,
}

impl ScriptedLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, program: &str, behaviour: Behaviour) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            arg: None,
            behaviour,
        });
        self
    }

    /// Rule for `program` invocations that have `arg` among their arguments.
    pub fn on_arg(&self, program: &str, arg: &str, behaviour: Behaviour) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            arg: Some(arg.to_string()),
            behaviour,
        });
        self
    }

    /// Every started run, in start order.
    pub fn runs(&self) -> Vec<CommandSpec> {
        self.journal.runs.lock().unwrap().clone()
    }

    /// `program arg...` of every started run, in start order.
    pub fn run_lines(&self) -> Vec<String> {
        self.runs()
            .iter()
            .map(|spec| {
                std::iter::once(spec.program.clone())
                    .chain(spec.args.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.runs().iter().filter(|s| s.program == program).count()
    }

    /// Runs that completed, with whether they succeeded.
    pub fn finished(&self) -> Vec<(CommandSpec, bool)> {
        self.journal.finished.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<CommandSpec> {
        self.journal.stops.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.journal.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.journal.max_in_flight.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, spec: &CommandSpec) -> Behaviour {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|rule| {
                rule.program == spec.program
                    && rule
                        .arg
                        .as_ref()
                        .is_none_or(|arg| spec.args.iter().any(|a| a == arg))
            })
            .map(|rule| rule.behaviour.clone())
            .unwrap_or_else(|| Behaviour::Output(String::new()))
    }
}

impl CommandLauncher for ScriptedLauncher {
    fn launch(&self, spec: CommandSpec) -> Arc<dyn ExternalCommand> {
        let behaviour = self.behaviour_for(&spec);
        Arc::new(ScriptedCommand {
            spec,
            behaviour,
            journal: self.journal.clone(),
            stopped: watch::Sender::new(false),
        })
    }
}
