//! weft-core
//!
//! Deferred values and the executors that produce them.
//!
//! # モジュール構成
//! - **domain**: Fault, resolution state, timing
//! - **ports**: Clock, LogSink
//! - **resolvable**: write-once value with observers
//! - **executor**: inline / pooled executors and the named registry
//! - **observation**: Observation, its combinators, `all`, the async bridge
//! - **future**: `Futures` facade (apply, successive, constants)
//! - **monitor**: PerformanceMonitor and its log entries
//! - **impls**: in-process LogSink implementations
//! - **config**: JSON runtime configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod future;
pub mod impls;
pub mod monitor;
pub mod observation;
pub mod ports;
pub mod resolvable;

pub use crate::config::{ExecutorConfig, RuntimeConfig};
pub use crate::domain::{Fault, Resolution, ResolutionState, Timing};
pub use crate::error::WeftError;
pub use crate::executor::{ExecutorHandle, ExecutorRegistry, ExecutorStats};
pub use crate::future::{ExecutorRef, FutureOptions, Futures, Next};
pub use crate::monitor::{LogEntry, MonitorName, PerformanceMonitor};
pub use crate::observation::{Observation, Observer};
pub use crate::resolvable::ResolvableValue;
