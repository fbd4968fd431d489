// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod logs;
pub mod model;
pub mod service;
pub mod store;
pub mod time;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, seed_store, ConfigFile};
use crate::engine::{CoreScheduler, Scheduler};
use crate::exec::{Executor, Kernel, ShellLauncher};
use crate::service::{ServiceDefaults, SyncService};
use crate::store::{FileStore, Store};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and seeding the store
/// - kernel / executor / service
/// - scheduler
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {}", args.config))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let store: Arc<dyn Store> = Arc::new(
        FileStore::open(&cfg.store_dir)
            .with_context(|| format!("opening store at {:?}", cfg.store_dir))?,
    );
    seed_store(&cfg, store.as_ref())?;

    let executor = Executor::new(Arc::new(Kernel::new()), Arc::new(ShellLauncher));
    let defaults = ServiceDefaults {
        wait_time: cfg.wait_time,
        mount_folder: cfg.mount_folder.clone(),
    };
    let service = Arc::new(SyncService::open(store, executor, defaults)?);

    if args.once {
        info!("running every task once");
        service.run_all().await;
        return Ok(());
    }

    let core = CoreScheduler::new(service.wait_time());
    let (scheduler, handle) = Scheduler::new(core, service.clone());

    // Ctrl-C → stop running commands, unmount, exit.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        if handle.shutdown().await.is_err() {
            debug!("scheduler already stopped");
        }
    });

    scheduler.run().await?;
    Ok(())
}

/// Simple dry-run output: print locations, tasks and their commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("mountsync dry-run");
    println!("  config.store_dir = {:?}", cfg.store_dir);
    println!("  config.wait_time = {:?}", cfg.wait_time);
    println!("  config.mount_folder = {}", cfg.mount_folder);
    println!();

    println!("remote types ({}):", cfg.remote_type.len());
    for (name, rt) in cfg.remote_type.iter() {
        println!("  - {name}");
        println!("      unmount: {}", rt.unmount);
    }

    let locations = cfg.location.local.len() + cfg.location.remote.len();
    println!("locations ({locations}):");
    for (name, loc) in cfg.location.local.iter() {
        println!("  - {name} (local): {}", loc.path);
    }
    for (name, loc) in cfg.location.remote.iter() {
        println!(
            "  - {name} (remote, {}): //{}/{} at {}/{name}",
            loc.remote_type,
            loc.address,
            loc.remote,
            cfg.mount_folder.trim_end_matches('/')
        );
    }

    println!("task types ({}):", cfg.task_type.len());
    for (name, tt) in cfg.task_type.iter() {
        println!("  - {name}: {}", tt.cmd);
    }

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}: {} --{}--> {}", task.src, task.task_type, task.dst);
    }

    debug!("dry-run complete (no execution)");
}
