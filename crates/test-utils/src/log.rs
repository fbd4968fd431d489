use std::fmt::Display;
use std::sync::Mutex;

use mountsync::logs::{split_lines, Log};

/// Log sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    closed: Mutex<bool>,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Only what went through [`Log::error`].
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl Log for RecordingLog {
    fn write(&self, text: &str) {
        let mut lines = self.lines.lock().unwrap();
        lines.extend(split_lines(text).map(str::to_string));
    }

    fn error(&self, err: &dyn Display) {
        let text = err.to_string();
        self.errors.lock().unwrap().push(text.clone());
        self.write(&format!("ERROR: {text}"));
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}
