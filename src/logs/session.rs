// src/logs/session.rs

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::store::LogStore;
use crate::time::to_key;

use super::{split_lines, Log};

/// Sink backed by one open log session in the store.
///
/// Lines are mirrored to `tracing` so the process log and the stored session
/// agree. A failed store write cannot be returned to the caller of
/// [`Log::write`]; it is reported as a warning instead.
pub struct SessionLog {
    store: Arc<dyn LogStore>,
    key: DateTime<Utc>,
}

impl SessionLog {
    /// Open a new session keyed by `key`.
    pub fn open(store: Arc<dyn LogStore>, key: DateTime<Utc>) -> Result<Self> {
        store.new_log_session(key)?;
        Ok(Self { store, key })
    }

    pub fn key(&self) -> DateTime<Utc> {
        self.key
    }

    fn append(&self, line: &str) {
        if let Err(e) = self.store.write_to_log_session(self.key, line) {
            warn!(session = %to_key(self.key), error = %e, "failed to append to log session");
        }
    }
}

impl Log for SessionLog {
    fn write(&self, text: &str) {
        for line in split_lines(text) {
            info!(target: "mountsync::session", session = %to_key(self.key), "{line}");
            self.append(line);
        }
    }

    fn error(&self, err: &dyn Display) {
        let text = format!("ERROR: {err}");
        for line in split_lines(&text) {
            error!(target: "mountsync::session", session = %to_key(self.key), "{line}");
            self.append(line);
        }
    }

    fn close(&self) {
        if let Err(e) = self.store.close_log_session(self.key) {
            warn!(session = %to_key(self.key), error = %e, "failed to close log session");
        }
    }
}
