// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] describes external invocations and the traits they run
//!   through.
//! - [`shell`] runs them as real child processes via `tokio::process`.
//! - [`kernel`] owns the one command slot and the global pause flag.
//! - [`task_runner`] drives a task through its mount/sync/unmount protocol on
//!   top of the kernel.

pub mod command;
pub mod kernel;
pub mod shell;
pub mod task_runner;

pub use command::{CommandFuture, CommandLauncher, CommandSpec, ExternalCommand};
pub use kernel::Kernel;
pub use shell::{ShellCommand, ShellLauncher};
pub use task_runner::Executor;
