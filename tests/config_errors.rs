// tests/config_errors.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use mountsync::config::{load_and_validate, seed_store, ConfigFile};
use mountsync::errors::MountsyncError;
use mountsync::store::{LocationStore, MemoryStore, TaskStore};
use mountsync_test_utils::builders::ConfigFileBuilder;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = write_config(contents);
    match load_and_validate(file.path()) {
        Err(MountsyncError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "{msg:?} should mention {needle:?}")
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn full_config_loads_with_defaults_applied() {
    let file = write_config(
        r#"
[remote_type.smb]
mount = "mount -t cifs //{address}/{remote} {mount} -o username={user},password={password}"
unmount = "umount {mount}"

[location.local.photos]
path = "/home/me/photos"

[location.remote.nas]
remote_type = "smb"
address = "192.168.1.10"
remote = "photos"

[task_type.mirror]
cmd = "rsync -a --delete {src}/ {dst}"

[task.photos-to-nas]
src = "photos"
task_type = "mirror"
dst = "nas"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.wait_time, Duration::from_secs(3600));
    assert_eq!(cfg.mount_folder, "/mnt/mountsync");
    assert_eq!(cfg.location.remote["nas"].username, "");
    assert_eq!(cfg.task["photos-to-nas"].dst, "nas");
}

#[test]
fn unknown_keys_are_toml_errors() {
    let file = write_config(
        r#"
[task_type.mirror]
cmd = "rsync"
after = ["nothing"]
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(MountsyncError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Mountsync.toml"),
        Err(MountsyncError::IoError(_))
    ));
}

#[test]
fn bad_wait_times_are_rejected() {
    expect_config_error("[config]\nwait_time = \"soon\"\n", "wait_time");
    expect_config_error("[config]\nwait_time = \"0s\"\n", "greater than zero");
}

#[test]
fn invalid_names_are_rejected() {
    expect_config_error(
        "[location.local.\"my photos\"]\npath = \"/home/me\"\n",
        "invalid name",
    );
}

#[test]
fn empty_templates_are_rejected() {
    expect_config_error("[task_type.noop]\ncmd = \"  \"\n", "empty cmd");
    expect_config_error(
        "[remote_type.smb]\nmount = \"mount {mount}\"\nunmount = \"\"\n",
        "unmount",
    );
}

#[test]
fn task_with_same_source_and_destination_is_rejected() {
    expect_config_error(
        r#"
[location.local.a]
path = "/a"

[task_type.sync]
cmd = "sync {src} {dst}"

[task.loop]
src = "a"
task_type = "sync"
dst = "a"
"#,
        "same source and destination",
    );
}

#[test]
fn location_cannot_be_both_local_and_remote() {
    let raw = ConfigFileBuilder::new()
        .remote_type("smb", "mount {mount}", "umount {mount}")
        .local("nas", "/nas")
        .remote("nas", "smb", "10.0.0.2")
        .raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("both local and remote"));
}

#[test]
fn seeding_adds_missing_entries_and_keeps_existing_ones() {
    let store = MemoryStore::new();
    let cfg = ConfigFileBuilder::new()
        .remote_type("smb", "mount {mount}", "umount {mount}")
        .local("home", "/home/me")
        .remote("nas", "smb", "10.0.0.2")
        .task_type("sync", "sync {src} {dst}")
        .task("backup", "home", "sync", "nas")
        .build();

    let report = seed_store(&cfg, &store).unwrap();
    assert_eq!(report.added.len(), 5);
    assert!(report.kept.is_empty());
    assert_eq!(store.read_task("backup").unwrap().dst, "nas");

    // A runtime edit survives a second seed with the same config.
    store.remove_local_location("home").unwrap();
    store
        .add_local_location(
            "home",
            &mountsync::store::LocalLocationRecord {
                path: "/srv/home".into(),
            },
        )
        .unwrap();
    let report = seed_store(&cfg, &store).unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.kept.len(), 5);
    assert_eq!(store.read_local_location("home").unwrap().path, "/srv/home");
}

#[test]
fn seeding_rejects_dangling_references() {
    let store = MemoryStore::new();
    let cfg = ConfigFileBuilder::new()
        .local("home", "/home/me")
        .task_type("sync", "sync {src} {dst}")
        .task("backup", "home", "sync", "nas")
        .build();
    let err = seed_store(&cfg, &store).unwrap_err();
    assert!(matches!(err, MountsyncError::ConfigError(ref m) if m.contains("unknown location 'nas'")));

    let cfg = ConfigFileBuilder::new()
        .remote("nas", "nfs", "10.0.0.2")
        .build();
    let err = seed_store(&cfg, &store).unwrap_err();
    assert!(matches!(err, MountsyncError::ConfigError(ref m) if m.contains("unknown remote_type 'nfs'")));
}

#[test]
fn seeded_references_may_point_at_store_entries() {
    let store = MemoryStore::new();
    let first = ConfigFileBuilder::new()
        .local("home", "/home/me")
        .local("usb", "/media/usb")
        .task_type("sync", "sync {src} {dst}")
        .build();
    seed_store(&first, &store).unwrap();

    let second = ConfigFileBuilder::new()
        .task("copy", "home", "sync", "usb")
        .build();
    let report = seed_store(&second, &store).unwrap();
    assert_eq!(report.added, vec!["task.copy".to_string()]);
    assert_eq!(store.list_tasks().unwrap(), vec!["copy".to_string()]);
}
