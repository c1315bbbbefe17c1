//! Execution contexts: where posted work runs.
//!
//! # 構成
//! - **inline**: runs work on the posting thread
//! - **pool**: bounded / unbounded worker pools with overflow-to-caller
//! - **registry**: name -> handle mapping, owns pool lifecycle, reports stats

pub mod inline;
pub mod pool;
pub mod registry;

pub use self::inline::InlineExecutor;
pub use self::pool::{PoolCounters, ThreadPool};
pub use self::registry::{DEFAULT, ExecutorRegistry, IMMEDIATE};

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unit of work accepted by an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Reported for limits that do not exist (unbounded threads or queue).
pub const UNBOUNDED: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    Inline,
    BoundedPool,
    UnboundedPool,
}

/// Thread and queue caps. `None` means no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutorLimits {
    pub max_threads: Option<NonZeroUsize>,
    pub max_queue: Option<usize>,
}

impl ExecutorLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_threads: Option<NonZeroUsize>, max_queue: Option<usize>) -> Self {
        Self {
            max_threads,
            max_queue,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_threads.is_none() && self.max_queue.is_none()
    }
}

/// Utilization snapshot of one executor.
///
/// Negative values mean "not tracked" (the inline executor has no counters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorStats {
    pub maximum_active_tasks: i64,
    pub maximum_queued_tasks: i64,
    pub largest_concurrency: i64,
    pub completed: i64,
    pub pending: i64,
    pub active: i64,
}

impl ExecutorStats {
    /// Sentinel snapshot reported by inline executors.
    pub const INLINE: ExecutorStats = ExecutorStats {
        maximum_active_tasks: 1,
        maximum_queued_tasks: 0,
        largest_concurrency: 1,
        completed: -1,
        pending: 0,
        active: -1,
    };

    /// Derive a snapshot from pool limits and counters.
    ///
    /// `active = scheduled - completed - pending`.
    pub fn from_counters(limits: ExecutorLimits, counters: PoolCounters) -> Self {
        let maximum_active_tasks = limits
            .max_threads
            .map_or(UNBOUNDED, |n| saturating_i64(n.get()));
        let maximum_queued_tasks = limits.max_queue.map_or(UNBOUNDED, saturating_i64);
        let scheduled = saturating_i64_u64(counters.scheduled);
        let completed = saturating_i64_u64(counters.completed);
        let pending = saturating_i64(counters.queue_length);
        Self {
            maximum_active_tasks,
            maximum_queued_tasks,
            largest_concurrency: saturating_i64(counters.largest_concurrency),
            completed,
            pending,
            active: scheduled - completed - pending,
        }
    }
}

fn saturating_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn saturating_i64_u64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Execution context.
pub trait Executor: Send + Sync {
    /// Schedule `job`. Never blocks waiting for capacity.
    fn post(&self, job: Job);

    fn kind(&self) -> ExecutorKind;

    fn limits(&self) -> ExecutorLimits;

    fn stats(&self) -> ExecutorStats;

    /// Stop accepting pool work. Already queued work still runs.
    fn shutdown(&self) {}

    /// Wait until every worker has exited. `true` if they did within `timeout`.
    fn await_termination(&self, _timeout: Duration) -> bool {
        true
    }
}

/// Named, cheaply cloneable handle to an executor.
#[derive(Clone)]
pub struct ExecutorHandle {
    name: Arc<str>,
    executor: Arc<dyn Executor>,
}

impl ExecutorHandle {
    pub fn new(name: impl Into<Arc<str>>, executor: Arc<dyn Executor>) -> Self {
        Self {
            name: name.into(),
            executor,
        }
    }

    /// Standalone inline executor; not registered anywhere.
    pub fn inline() -> Self {
        Self::new(IMMEDIATE, Arc::new(InlineExecutor::new()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.executor.post(Box::new(job));
    }

    pub fn kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    pub fn limits(&self) -> ExecutorLimits {
        self.executor.limits()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.executor.stats()
    }

    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.executor.await_termination(timeout)
    }

    /// Same underlying executor?
    pub fn ptr_eq(&self, other: &ExecutorHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.executor), Arc::as_ptr(&other.executor))
    }
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}
