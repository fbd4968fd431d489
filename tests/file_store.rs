// tests/file_store.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use mountsync::config::seed_store;
use mountsync::exec::{Executor, Kernel};
use mountsync::model::Tasks;
use mountsync::service::{ServiceDefaults, SyncService};
use mountsync::store::{FileStore, Store, TaskStore};
use mountsync_test_utils::builders::{temp_file_store, ConfigFileBuilder};
use mountsync_test_utils::commands::ScriptedLauncher;
use mountsync_test_utils::log::RecordingLog;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn seeded_config_and_completions_survive_a_restart() -> TestResult {
    let (dir, store) = temp_file_store();
    let cfg = ConfigFileBuilder::new()
        .remote_type("smb", "mount //{address}/{remote} {mount}", "umount {mount}")
        .local("home", "/home/me")
        .remote("nas", "smb", "10.0.0.2")
        .task_type("sync", "sync {src} {dst}")
        .task("backup", "home", "sync", "nas")
        .build();
    seed_store(&cfg, &store)?;

    let older = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let newer = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
    store.add_task_completed("backup", newer)?;
    store.add_task_completed("backup", older)?;
    drop(store);

    let reopened = FileStore::open(dir.path())?;
    let tasks = Tasks::load(&reopened, &RecordingLog::new())?;
    let backup = tasks.get("backup").expect("task reloaded");
    assert_eq!(backup.last_completed(), Some(newer));
    assert_eq!(backup.src(), "home");
    assert_eq!(backup.dst(), "nas");
    Ok(())
}

#[tokio::test]
async fn service_on_a_file_store_keeps_settings_and_sessions() -> TestResult {
    let (dir, store) = temp_file_store();
    let open = |store: FileStore| {
        let store: Arc<dyn Store> = Arc::new(store);
        SyncService::open(
            store,
            Executor::new(Arc::new(Kernel::new()), ScriptedLauncher::new()),
            ServiceDefaults {
                wait_time: Duration::from_secs(3600),
                mount_folder: "/mnt/sync".to_string(),
            },
        )
    };

    let service = open(store)?;
    service.set_wait_time(Duration::from_secs(90))?;
    service.stop_and_block().await;
    drop(service);

    let service = open(FileStore::open(dir.path())?)?;
    assert_eq!(service.wait_time(), Duration::from_secs(90));
    let sessions = service.logs()?;
    assert_eq!(sessions.len(), 1);
    let lines = service.read_log(sessions[0].at)?;
    assert!(lines.iter().any(|l| l.line == "Stopped and blocked"));
    Ok(())
}
