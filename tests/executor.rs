// tests/executor.rs

use std::collections::BTreeSet;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use mountsync::model::{diffs_per_location, Location, Locations, Task};
use mountsync::store::{FilelistStore, TaskStore};
use mountsync_test_utils::builders::{remote_location, sync_type, ExecutorHarness};
use mountsync_test_utils::commands::{Behaviour, Gate};
use mountsync_test_utils::log::RecordingLog;
use mountsync_test_utils::{init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn local_pair() -> Locations {
    [Location::local("a", "."), Location::local("b", ".")]
        .into_iter()
        .collect()
}

fn spawn_execute(h: &ExecutorHarness, task: &Task, locations: &Locations) -> JoinHandle<()> {
    let executor = h.executor.clone();
    let store = h.store.clone();
    let task = task.clone();
    let locations = locations.clone();
    tokio::spawn(async move {
        executor
            .execute(&RecordingLog::new(), &task, &locations, store.as_ref())
            .await
    })
}

#[tokio::test]
async fn busy_with_names_the_task_until_its_command_returns() -> TestResult {
    init_tracing();
    let h = ExecutorHarness::new();
    h.dir(".");
    let gate = Gate::new();
    h.launcher.on("sync", Behaviour::Block(gate.clone()));
    let task = Task::new("movefile", "a", sync_type(), "b");

    let running = spawn_execute(&h, &task, &local_pair());
    wait_until(|| h.executor.busy_with() == "movefile").await;
    assert_eq!(h.launcher.count("sync"), 1);

    gate.open();
    tokio::time::timeout(Duration::from_secs(1), async {
        while !h.executor.busy_with().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await?;
    running.await?;

    assert!(task.last_completed().is_some());
    assert_eq!(h.store.list_task_completed("movefile")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn stop_and_block_interrupts_and_nothing_completes_until_unblocked() -> TestResult {
    init_tracing();
    let h = ExecutorHarness::new();
    h.dir(".");
    let gate = Gate::new();
    h.launcher.on("sync", Behaviour::Block(gate.clone()));
    let task = Task::new("movefile", "a", sync_type(), "b");
    let locations = local_pair();

    let first = spawn_execute(&h, &task, &locations);
    wait_until(|| h.executor.busy_with() == "movefile").await;

    let log = RecordingLog::new();
    with_timeout(h.executor.stop_and_block(&log)).await;
    assert!(h.executor.busy_with().is_empty());
    assert!(h.executor.blocked());
    first.await?;
    assert_eq!(h.launcher.stops().len(), 1);
    assert!(task.last_completed().is_none());

    // Blocked: the task is picked up and dropped without running anything.
    gate.open();
    spawn_execute(&h, &task, &locations).await?;
    assert_eq!(h.launcher.count("sync"), 1);
    assert!(task.last_completed().is_none());

    h.executor.unblock();
    spawn_execute(&h, &task, &locations).await?;
    assert_eq!(h.launcher.count("sync"), 2);
    assert!(task.last_completed().is_some());
    assert_eq!(h.store.list_task_completed("movefile")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn executions_never_overlap() -> TestResult {
    init_tracing();
    let h = ExecutorHarness::new();
    h.dir(".");
    h.launcher
        .on("sync", Behaviour::Sleep(Duration::from_millis(10)));
    let locations = local_pair();
    let tasks: Vec<Task> = (0..5)
        .map(|i| Task::new(format!("task{i}"), "a", sync_type(), "b"))
        .collect();

    let done = Arc::new(AtomicBool::new(false));
    let observer = {
        let executor = h.executor.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut seen: Vec<String> = Vec::new();
            while !done.load(Ordering::SeqCst) {
                let busy = executor.busy_with();
                if !busy.is_empty() && seen.last() != Some(&busy) {
                    seen.push(busy);
                }
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    let handles: Vec<_> = tasks
        .iter()
        .map(|task| spawn_execute(&h, task, &locations))
        .collect();
    for handle in handles {
        with_timeout(handle).await?;
    }
    done.store(true, Ordering::SeqCst);

    assert_eq!(h.launcher.max_in_flight(), 1);

    // Each task shows up in busy_with as one uninterrupted stretch.
    let seen = observer.await?;
    let distinct: BTreeSet<_> = seen.iter().collect();
    assert_eq!(distinct.len(), seen.len());
    for task in &tasks {
        assert!(task.last_completed().is_some(), "{} did not complete", task.name());
    }
    Ok(())
}

#[tokio::test]
async fn failed_work_command_still_unmounts_in_reverse_order() -> TestResult {
    init_tracing();
    let h = ExecutorHarness::new();
    h.dir("/mnt/sync/nas").dir("/mnt/sync/backup");
    h.launcher
        .on("nmap", Behaviour::output("Nmap scan report\nHost is up (0.0010s latency)."))
        .on("sync", Behaviour::Fail(23));
    let locations: Locations = [
        remote_location("nas", "10.0.0.2"),
        remote_location("backup", "10.0.0.3"),
    ]
    .into_iter()
    .collect();
    let task = Task::new("offsite", "nas", sync_type(), "backup");

    let log = RecordingLog::new();
    h.executor
        .execute(&log, &task, &locations, h.store.as_ref())
        .await;

    assert_eq!(
        h.launcher.run_lines(),
        vec![
            "ls /mnt/sync/nas",
            "ls /mnt/sync/backup",
            "umount /mnt/sync/nas",
            "umount /mnt/sync/backup",
            "nmap -sP 10.0.0.2",
            "nmap -sP 10.0.0.3",
            "mount //10.0.0.2/share /mnt/sync/nas -o user=user,pass=secret",
            "mount //10.0.0.3/share /mnt/sync/backup -o user=user,pass=secret",
            "sync /mnt/sync/nas /mnt/sync/backup",
            "umount /mnt/sync/backup",
            "umount /mnt/sync/nas",
        ]
    );
    assert!(task.last_completed().is_none());
    assert_eq!(log.errors().len(), 1);
    assert!(log.errors()[0].contains("exit code 23"));
    assert!(!log.lines().iter().any(|l| l.contains("pass=secret")));

    // Only the snapshots taken before the failed command were stored.
    assert_eq!(h.store.list_filelists()?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_dst_mount_only_unmounts_src() -> TestResult {
    let h = ExecutorHarness::new();
    h.launcher
        .on("nmap", Behaviour::output("Host is up"))
        .on_arg("mount", "/mnt/sync/backup", Behaviour::Fail(32));
    let locations: Locations = [
        remote_location("nas", "10.0.0.2"),
        remote_location("backup", "10.0.0.3"),
    ]
    .into_iter()
    .collect();
    let task = Task::new("offsite", "nas", sync_type(), "backup");

    h.executor
        .execute(&RecordingLog::new(), &task, &locations, h.store.as_ref())
        .await;

    let lines = h.launcher.run_lines();
    let tail: Vec<_> = lines.iter().rev().take(2).rev().cloned().collect();
    assert!(tail[0].starts_with("mount //10.0.0.3/share"));
    assert_eq!(tail[1], "umount /mnt/sync/nas");
    assert_eq!(h.launcher.count("sync"), 0);
    assert_eq!(h.launcher.count("umount"), 3);
    Ok(())
}

#[tokio::test]
async fn unreachable_location_is_skipped_quietly_every_time() -> TestResult {
    init_tracing();
    let h = ExecutorHarness::new();
    h.dir("/mnt/sync/nas").dir("/home/me");
    h.launcher
        .on("nmap", Behaviour::output("Note: Host seems down."));
    let locations: Locations = [
        Location::local("home", "/home/me"),
        remote_location("nas", "10.0.0.2"),
    ]
    .into_iter()
    .collect();
    let task = Task::new("backup", "home", sync_type(), "nas");

    let log = RecordingLog::new();
    for _ in 0..3 {
        h.executor
            .execute(&log, &task, &locations, h.store.as_ref())
            .await;
    }

    assert_eq!(h.launcher.count("nmap"), 3);
    assert_eq!(h.launcher.count("mount"), 0);
    assert_eq!(h.launcher.count("sync"), 0);
    assert!(task.last_completed().is_none());
    assert!(log.errors().is_empty());
    assert!(log.contains("Cannot locate"));
    Ok(())
}

#[tokio::test]
async fn unprepared_location_is_prepared_and_failed_prepare_aborts() -> TestResult {
    let h = ExecutorHarness::new();
    h.dir("/home/me").dir("/mnt/sync/nas");
    h.launcher
        .on("ls", Behaviour::Fail(2))
        .on("nmap", Behaviour::output("Host is up"));
    let locations: Locations = [
        Location::local("home", "/home/me"),
        remote_location("nas", "10.0.0.2"),
    ]
    .into_iter()
    .collect();
    let task = Task::new("backup", "home", sync_type(), "nas");

    h.executor
        .execute(&RecordingLog::new(), &task, &locations, h.store.as_ref())
        .await;
    assert_eq!(h.launcher.run_lines()[..2], ["ls /mnt/sync/nas", "mkdir -p /mnt/sync/nas"]);
    assert!(task.last_completed().is_some());

    let h = ExecutorHarness::new();
    h.launcher
        .on("ls", Behaviour::Fail(2))
        .on("mkdir", Behaviour::Fail(1));
    let log = RecordingLog::new();
    h.executor
        .execute(&log, &task, &locations, h.store.as_ref())
        .await;
    assert_eq!(h.launcher.run_lines(), vec!["ls /mnt/sync/nas", "mkdir -p /mnt/sync/nas"]);
    assert_eq!(log.errors().len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_location_is_logged_and_nothing_runs() {
    let h = ExecutorHarness::new();
    let task = Task::new("orphan", "a", sync_type(), "gone");
    let log = RecordingLog::new();

    h.executor
        .execute(&log, &task, &local_pair(), h.store.as_ref())
        .await;

    assert!(h.launcher.runs().is_empty());
    assert_eq!(log.errors(), vec!["Location does not exist: gone".to_string()]);
    assert!(h.executor.busy_with().is_empty());
}

#[tokio::test]
async fn successful_run_records_snapshots_and_diffs() -> TestResult {
    let h = ExecutorHarness::new();
    h.dir("/src").file("/src/a.txt").dir("/dst");
    let locations: Locations = [Location::local("src", "/src"), Location::local("dst", "/dst")]
        .into_iter()
        .collect();
    let task = Task::new("copy", "src", sync_type(), "dst");

    h.executor
        .execute(&RecordingLog::new(), &task, &locations, h.store.as_ref())
        .await;

    assert_eq!(h.launcher.run_lines(), vec!["sync /src /dst"]);
    assert_eq!(h.store.list_filelists()?.len(), 4);
    let diffs = diffs_per_location(h.store.as_ref())?;
    assert_eq!(diffs["src"].len(), 1);
    assert_eq!(diffs["dst"].len(), 1);
    let (created, deleted) = diffs["src"][0].take(h.store.as_ref())?;
    assert!(created.is_empty() && deleted.is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_executions_record_one_completion_each() -> TestResult {
    init_tracing();
    let h = ExecutorHarness::new();
    h.dir(".");
    let locations = local_pair();
    let tasks: Vec<Task> = (0..10)
        .map(|i| Task::new(format!("task{i}"), "a", sync_type(), "b"))
        .collect();

    let handles: Vec<_> = tasks
        .iter()
        .map(|task| spawn_execute(&h, task, &locations))
        .collect();
    for handle in handles {
        with_timeout(handle).await?;
    }

    let mut total = 0;
    for task in &tasks {
        let completions = h.store.list_task_completed(task.name())?;
        assert_eq!(completions.len(), 1, "{}", task.name());
        total += completions.len();
    }
    assert_eq!(total, 10);
    assert_eq!(h.launcher.count("sync"), 10);
    Ok(())
}
