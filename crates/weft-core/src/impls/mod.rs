//! Impls - ports の実装
//!
//! In-process sinks. Anything that ships entries off-process implements
//! `LogSink` outside this crate.

pub mod memory_sink;
pub mod tracing_sink;

pub use self::memory_sink::InMemorySink;
pub use self::tracing_sink::TracingSink;
