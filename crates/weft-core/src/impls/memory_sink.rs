//! Collects entries in memory, in write order.

use parking_lot::Mutex;

use crate::monitor::LogEntry;
use crate::ports::LogSink;

#[derive(Debug, Default)]
pub struct InMemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for InMemorySink {
    fn write(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}
