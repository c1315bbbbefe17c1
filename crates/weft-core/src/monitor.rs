//! PerformanceMonitor - 処理時間と結果の記録
//!
//! Attaches to an observation through `on_timed` and writes exactly one
//! `LogEntry` per monitored operation, after it resolves.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::domain::{Fault, Timing};
use crate::executor::ExecutorHandle;
use crate::observation::Observation;
use crate::ports::{Clock, LogSink, SystemClock};

/// How a monitored operation is labelled in its entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorName {
    /// Written as a single `name` field.
    Name(String),
    /// Merged into the entry as top-level fields.
    Tags(BTreeMap<String, Value>),
}

impl From<&str> for MonitorName {
    fn from(name: &str) -> Self {
        MonitorName::Name(name.to_string())
    }
}

impl From<String> for MonitorName {
    fn from(name: String) -> Self {
        MonitorName::Name(name)
    }
}

impl From<BTreeMap<String, Value>> for MonitorName {
    fn from(tags: BTreeMap<String, Value>) -> Self {
        MonitorName::Tags(tags)
    }
}

impl From<BTreeMap<String, String>> for MonitorName {
    fn from(tags: BTreeMap<String, String>) -> Self {
        MonitorName::Tags(
            tags.into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }
}

impl MonitorName {
    fn into_fields(self) -> BTreeMap<String, Value> {
        match self {
            MonitorName::Name(name) => BTreeMap::from([("name".to_string(), Value::String(name))]),
            MonitorName::Tags(tags) => tags,
        }
    }
}

/// One monitored operation.
///
/// Serialized as a flat record. Tags are merged last, so a tag named like a
/// built-in field (`sender`, `duration`, ...) replaces that field.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub sender: String,
    pub operation: String,
    /// `name`, or the merged tags.
    pub fields: BTreeMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Seconds.
    pub duration: f64,
    pub result: Value,
    pub error: Option<Fault>,
}

impl LogEntry {
    pub fn to_json(&self) -> Value {
        Value::Object(self.record())
    }

    fn record(&self) -> Map<String, Value> {
        let timestamp = |at: &DateTime<Utc>| {
            Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        };
        let mut record = Map::new();
        record.insert("sender".into(), Value::String(self.sender.clone()));
        record.insert("operation".into(), Value::String(self.operation.clone()));
        record.insert("started_at".into(), timestamp(&self.started_at));
        record.insert("completed_at".into(), timestamp(&self.completed_at));
        record.insert(
            "duration".into(),
            Number::from_f64(self.duration).map_or(Value::Null, Value::Number),
        );
        record.insert("result".into(), self.result.clone());
        record.insert(
            "error".into(),
            self.error
                .as_ref()
                .map_or(Value::Null, |fault| Value::String(fault.to_string())),
        );
        for (key, value) in &self.fields {
            record.insert(key.clone(), value.clone());
        }
        record
    }
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record().serialize(serializer)
    }
}

pub struct PerformanceMonitor {
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    executor: ExecutorHandle,
}

impl PerformanceMonitor {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock))
    }

    /// `clock` times monitored blocks.
    pub fn with_clock(sink: Arc<dyn LogSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sink,
            clock,
            executor: ExecutorHandle::inline(),
        }
    }

    /// Log `observation` once it resolves.
    pub fn monitor<T>(
        &self,
        sender: &str,
        operation: &str,
        name: impl Into<MonitorName>,
        observation: &Observation<T>,
    ) where
        T: Clone + Send + Serialize + 'static,
    {
        let sink = Arc::clone(&self.sink);
        let sender = sender.to_string();
        let operation = operation.to_string();
        let fields = name.into().into_fields();

        observation.on_timed(move |timing, result| {
            sink.write(build_entry(sender, operation, fields, timing, result));
        });
    }

    /// Run `block` now, time it, log it, and return its observation.
    pub fn monitor_block<T, F>(
        &self,
        sender: &str,
        operation: &str,
        name: impl Into<MonitorName>,
        block: F,
    ) -> Observation<T>
    where
        T: Clone + Send + Serialize + 'static,
        F: FnOnce() -> Result<T, Fault>,
    {
        let observation =
            Observation::immediate(self.executor.clone(), Arc::clone(&self.clock), block);
        self.monitor(sender, operation, name, &observation);
        observation
    }
}

fn build_entry<T: Serialize>(
    sender: String,
    operation: String,
    fields: BTreeMap<String, Value>,
    timing: Timing,
    result: Result<T, Fault>,
) -> LogEntry {
    let (result, error) = match result {
        Ok(value) => {
            let value = serde_json::to_value(&value).unwrap_or_else(|e| {
                tracing::warn!(%sender, %operation, error = %e, "monitored result not serializable");
                Value::Null
            });
            (value, None)
        }
        Err(fault) => (Value::Null, Some(fault)),
    };
    LogEntry {
        sender,
        operation,
        fields,
        started_at: timing.started_at,
        completed_at: timing.completed_at,
        duration: timing.duration_secs(),
        result,
        error,
    }
}
