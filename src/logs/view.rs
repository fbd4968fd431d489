// src/logs/view.rs

//! Read-only views over stored log sessions.

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::store::LogStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSessionSummary {
    pub at: DateTime<Utc>,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Position of the line within its session, starting at 0.
    pub number: usize,
    pub at: DateTime<Utc>,
    pub line: String,
}

/// All sessions, newest first.
pub fn list_sessions(store: &dyn LogStore) -> Result<Vec<LogSessionSummary>> {
    let mut sessions: Vec<_> = store
        .list_log_sessions()?
        .into_iter()
        .map(|at| LogSessionSummary {
            at,
            open: store.is_log_session_open(at),
        })
        .collect();
    sessions.sort_by(|a, b| b.at.cmp(&a.at));
    Ok(sessions)
}

/// Lines of one session, newest first.
pub fn read_session(store: &dyn LogStore, key: DateTime<Utc>) -> Result<Vec<LogLine>> {
    let mut lines: Vec<_> = store
        .read_log_session(key)?
        .into_iter()
        .enumerate()
        .map(|(number, (at, line))| LogLine { number, at, line })
        .collect();
    lines.reverse();
    Ok(lines)
}

/// Delete a closed session.
pub fn delete_session(store: &dyn LogStore, key: DateTime<Utc>) -> Result<()> {
    store.delete_log_session(key)
}
