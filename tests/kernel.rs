// tests/kernel.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use mountsync::errors::MountsyncError;
use mountsync::exec::{CommandFuture, CommandLauncher, CommandSpec, ExternalCommand, Kernel};
use mountsync::logs::Log;
use mountsync_test_utils::commands::{Behaviour, Gate, ScriptedLauncher};
use mountsync_test_utils::log::RecordingLog;
use mountsync_test_utils::{init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn command(launcher: &ScriptedLauncher, program: &str) -> Option<Arc<dyn ExternalCommand>> {
    Some(launcher.launch(CommandSpec::new(program, Vec::<String>::new())))
}

#[tokio::test]
async fn run_returns_command_output() -> TestResult {
    init_tracing();
    let kernel = Kernel::new();
    let launcher = ScriptedLauncher::new();
    launcher.on("nmap", Behaviour::output("Host is up"));

    let out = kernel.run(&RecordingLog::new(), command(&launcher, "nmap")).await?;
    assert_eq!(out, "Host is up");
    assert!(kernel.running().is_none());
    Ok(())
}

#[tokio::test]
async fn no_command_is_a_no_op() -> TestResult {
    let kernel = Kernel::new();
    let log = RecordingLog::new();
    assert_eq!(kernel.run(&log, None).await?, "");
    kernel.sudo_run(&log, None).await;
    assert!(log.lines().is_empty());
    Ok(())
}

#[tokio::test]
async fn stop_and_block_stops_the_running_command() -> TestResult {
    init_tracing();
    let kernel = Arc::new(Kernel::new());
    let launcher = ScriptedLauncher::new();
    launcher.on("rsync", Behaviour::Block(Gate::new()));

    let runner = {
        let kernel = kernel.clone();
        let cmd = command(&launcher, "rsync");
        tokio::spawn(async move { kernel.run(&RecordingLog::new(), cmd).await })
    };
    wait_until(|| kernel.running().is_some()).await;

    kernel.stop_and_block(&RecordingLog::new());

    let result = with_timeout(runner).await?;
    assert!(matches!(result, Err(MountsyncError::Stopped(_))));
    assert_eq!(launcher.stops().len(), 1);
    assert!(kernel.blocked());
    assert!(kernel.running().is_none());
    Ok(())
}

#[tokio::test]
async fn blocked_kernel_refuses_runs_without_starting_them() -> TestResult {
    let kernel = Kernel::new();
    let launcher = ScriptedLauncher::new();
    kernel.stop_and_block(&RecordingLog::new());

    let result = kernel.run(&RecordingLog::new(), command(&launcher, "mount")).await;
    assert!(matches!(result, Err(ref e) if e.is_paused()));
    assert!(launcher.runs().is_empty());

    kernel.unblock();
    assert!(!kernel.blocked());
    kernel.run(&RecordingLog::new(), command(&launcher, "mount")).await?;
    assert_eq!(launcher.count("mount"), 1);
    Ok(())
}

#[tokio::test]
async fn sudo_run_ignores_the_block() {
    let kernel = Kernel::new();
    let launcher = ScriptedLauncher::new();
    kernel.stop_and_block(&RecordingLog::new());

    kernel.sudo_run(&RecordingLog::new(), command(&launcher, "umount")).await;

    assert_eq!(launcher.count("umount"), 1);
    assert_eq!(launcher.finished().len(), 1);
    assert!(launcher.finished()[0].1);
}

#[tokio::test]
async fn sudo_run_swallows_failures() {
    let kernel = Kernel::new();
    let launcher = ScriptedLauncher::new();
    launcher.on("umount", Behaviour::Fail(32));

    kernel.sudo_run(&RecordingLog::new(), command(&launcher, "umount")).await;
    assert_eq!(launcher.finished(), vec![(CommandSpec::new("umount", Vec::<String>::new()), false)]);
}

#[tokio::test]
async fn stop_during_run_then_sudo_run_still_executes() -> TestResult {
    init_tracing();
    let kernel = Arc::new(Kernel::new());
    let launcher = ScriptedLauncher::new();
    launcher.on("rsync", Behaviour::Block(Gate::new()));

    let runner = {
        let kernel = kernel.clone();
        let cmd = command(&launcher, "rsync");
        tokio::spawn(async move { kernel.run(&RecordingLog::new(), cmd).await })
    };
    wait_until(|| kernel.running().is_some()).await;
    kernel.stop_and_block(&RecordingLog::new());
    assert!(with_timeout(runner).await?.is_err());

    let gate = Gate::new();
    launcher.on("umount", Behaviour::Block(gate.clone()));
    let sudo = {
        let kernel = kernel.clone();
        let cmd = command(&launcher, "umount");
        tokio::spawn(async move { kernel.sudo_run(&RecordingLog::new(), cmd).await })
    };
    wait_until(|| launcher.count("umount") == 1).await;
    gate.open();
    with_timeout(sudo).await?;

    let umount = launcher
        .finished()
        .into_iter()
        .find(|(spec, _)| spec.program == "umount")
        .expect("umount finished");
    assert!(umount.1);
    Ok(())
}

#[tokio::test]
async fn many_runs_proceed_concurrently_and_finish_in_release_order() -> TestResult {
    init_tracing();
    let num = 10;
    let kernel = Arc::new(Kernel::new());
    let launcher = ScriptedLauncher::new();
    let gates: Vec<Gate> = (0..num).map(|_| Gate::new()).collect();
    for (i, gate) in gates.iter().enumerate() {
        launcher.on(&format!("cmd{i}"), Behaviour::Block(gate.clone()));
    }

    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    for i in 0..num {
        let kernel = kernel.clone();
        let cmd = command(&launcher, &format!("cmd{i}"));
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = kernel.run(&RecordingLog::new(), cmd).await;
            let _ = done_tx.send((i, result.is_ok()));
        });
    }

    // The kernel only serializes its bookkeeping, never the commands.
    wait_until(|| launcher.in_flight() == num).await;

    for (i, gate) in gates.iter().enumerate() {
        gate.open();
        let (finished, ok) = with_timeout(done_rx.recv()).await.expect("run finished");
        assert_eq!(finished, i);
        assert!(ok);
    }
    Ok(())
}

/// A command whose `stop` looks at the kernel it is registered with.
struct ReportsKernelOnStop {
    kernel: Arc<Kernel>,
    stopped: Notify,
    seen: Mutex<Option<(bool, Option<String>)>>,
}

impl ExternalCommand for ReportsKernelOnStop {
    fn describe(&self) -> String {
        "reports-kernel".to_string()
    }

    fn run<'a>(&'a self, _log: &'a dyn Log) -> CommandFuture<'a> {
        Box::pin(async move {
            self.stopped.notified().await;
            Err(MountsyncError::Stopped(self.describe()))
        })
    }

    fn stop(&self, _log: &dyn Log) {
        *self.seen.lock().unwrap() = Some((self.kernel.blocked(), self.kernel.running()));
        self.stopped.notify_one();
    }
}

#[tokio::test]
async fn stop_may_query_the_kernel() -> TestResult {
    init_tracing();
    let kernel = Arc::new(Kernel::new());
    let cmd = Arc::new(ReportsKernelOnStop {
        kernel: kernel.clone(),
        stopped: Notify::new(),
        seen: Mutex::new(None),
    });

    let runner = {
        let kernel = kernel.clone();
        let cmd: Arc<dyn ExternalCommand> = cmd.clone();
        tokio::spawn(async move { kernel.run(&RecordingLog::new(), Some(cmd)).await })
    };
    wait_until(|| kernel.running().is_some()).await;

    let stopper = {
        let kernel = kernel.clone();
        tokio::task::spawn_blocking(move || kernel.stop_and_block(&RecordingLog::new()))
    };
    with_timeout(stopper).await?;

    assert_eq!(*cmd.seen.lock().unwrap(), Some((true, None)));
    assert!(matches!(with_timeout(runner).await?, Err(MountsyncError::Stopped(_))));
    Ok(())
}
