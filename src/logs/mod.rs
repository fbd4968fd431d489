// src/logs/mod.rs

//! Operator-facing log sinks.
//!
//! Every kernel, executor and location call takes a `&dyn Log`. A sink turns
//! free-form text, command invocations, errors and subprocess output into
//! timestamped lines. [`SessionLog`] persists them as a log session in the
//! store (and mirrors them to `tracing`); [`TracingLog`] only mirrors.
//!
//! [`view`] holds the read side used by the presentation layer.

use std::fmt::Display;

use tracing::{error, info};

use crate::exec::CommandSpec;

pub mod session;
pub mod view;

pub use session::SessionLog;
pub use view::{delete_session, list_sessions, read_session, LogLine, LogSessionSummary};

/// Structured sink for operator-visible log lines.
pub trait Log: Send + Sync {
    /// Record free-form text. Multi-line text is split into lines.
    fn write(&self, text: &str);

    /// Record that a command is about to run.
    fn run(&self, command: &CommandSpec) {
        self.write(&format!("> {command}"));
    }

    fn error(&self, err: &dyn Display) {
        self.write(&format!("ERROR: {err}"));
    }

    /// One line of subprocess output.
    fn output(&self, line: &str) {
        self.write(line);
    }

    /// Stop accepting lines. Default is a no-op.
    fn close(&self) {}
}

/// Split text into the non-blank, trimmed lines a sink should record.
///
/// Both `\n` and `\r` separate lines so that progress output from tools like
/// `rsync --progress` does not end up as one enormous line.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Sink that only emits through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingLog;

impl Log for TracingLog {
    fn write(&self, text: &str) {
        for line in split_lines(text) {
            info!(target: "mountsync::session", "{line}");
        }
    }

    fn error(&self, err: &dyn Display) {
        error!(target: "mountsync::session", "{err}");
    }
}
