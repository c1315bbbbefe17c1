//! LogSink port - 計測ログの出力先
//!
//! The performance monitor hands every finished entry to a sink. Sinks must
//! be callable from any executor thread.

use crate::monitor::LogEntry;

pub trait LogSink: Send + Sync {
    fn write(&self, entry: LogEntry);
}
