//! Emits each entry as one `tracing` event on target `weft::performance`.

use crate::monitor::LogEntry;
use crate::ports::LogSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn write(&self, entry: LogEntry) {
        let fields = serde_json::Value::Object(entry.fields.clone().into_iter().collect());
        match &entry.error {
            None => tracing::info!(
                target: "weft::performance",
                sender = %entry.sender,
                operation = %entry.operation,
                fields = %fields,
                started_at = %entry.started_at,
                completed_at = %entry.completed_at,
                duration = entry.duration,
                result = %entry.result,
                "operation completed"
            ),
            Some(fault) => tracing::info!(
                target: "weft::performance",
                sender = %entry.sender,
                operation = %entry.operation,
                fields = %fields,
                started_at = %entry.started_at,
                completed_at = %entry.completed_at,
                duration = entry.duration,
                error = %fault,
                "operation failed"
            ),
        }
    }
}
