//! ExecutorRegistry - 名前付き Executor の登録と管理
//!
//! Maps names to executor handles. `"immediate"` (inline) is present from the
//! start; everything else is created through `build`. Building under an
//! existing name replaces the entry; handles already held elsewhere keep
//! working against the old executor.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::{ExecutorHandle, ExecutorLimits, ExecutorStats, InlineExecutor, ThreadPool};
use crate::config::RuntimeConfig;
use crate::error::WeftError;

/// Name of the pre-registered inline executor.
pub const IMMEDIATE: &str = "immediate";

/// Name under which the facade registers its shared unbounded pool.
pub const DEFAULT: &str = "default";

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, ExecutorHandle>>,
    idle_timeout: Duration,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    /// Pools built by this registry retire workers idle for `idle_timeout`.
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        let mut executors = HashMap::new();
        executors.insert(
            IMMEDIATE.to_string(),
            ExecutorHandle::new(IMMEDIATE, Arc::new(InlineExecutor::new())),
        );
        Self {
            executors: RwLock::new(executors),
            idle_timeout,
        }
    }

    /// Build every executor listed in `config`.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, WeftError> {
        config.validate()?;
        let registry = Self::with_idle_timeout(config.idle_timeout());
        for executor in &config.executors {
            registry.build(&executor.name, executor.max_threads, executor.max_queue);
        }
        Ok(registry)
    }

    /// Create a pool under `name`, replacing any previous entry.
    ///
    /// No limits -> unbounded pool. Any limit -> bounded pool that runs
    /// overflow on the caller.
    pub fn build(
        &self,
        name: &str,
        max_threads: Option<NonZeroUsize>,
        max_queue: Option<usize>,
    ) -> ExecutorHandle {
        let limits = ExecutorLimits::bounded(max_threads, max_queue);
        let pool = ThreadPool::new(name, limits, self.idle_timeout);
        let handle = ExecutorHandle::new(name, Arc::new(pool));

        let previous = self
            .executors
            .write()
            .insert(name.to_string(), handle.clone());
        tracing::debug!(
            executor = name,
            kind = ?handle.kind(),
            ?max_threads,
            ?max_queue,
            replaced = previous.is_some(),
            "executor built"
        );
        handle
    }

    pub fn lookup(&self, name: &str) -> Result<ExecutorHandle, WeftError> {
        self.executors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| WeftError::UnknownExecutor(name.to_string()))
    }

    /// Existing entry under `name`, or a freshly built unbounded pool.
    pub fn get_or_build_unbounded(&self, name: &str) -> ExecutorHandle {
        if let Ok(handle) = self.lookup(name) {
            return handle;
        }
        self.executors
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(executor = name, "unbounded executor built");
                let pool = ThreadPool::new(name, ExecutorLimits::unbounded(), self.idle_timeout);
                ExecutorHandle::new(name, Arc::new(pool))
            })
            .clone()
    }

    /// Registered executor names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> BTreeMap<String, ExecutorStats> {
        self.executors
            .read()
            .iter()
            .map(|(name, handle)| (name.clone(), handle.stats()))
            .collect()
    }

    /// Shut every executor down and wait up to `timeout` for their workers.
    /// `true` if all of them terminated.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let handles: Vec<ExecutorHandle> = self.executors.read().values().cloned().collect();
        for handle in &handles {
            handle.shutdown();
        }
        handles
            .iter()
            .all(|handle| handle.await_termination(timeout))
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorKind;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn immediate_executor_is_preregistered() {
        let registry = ExecutorRegistry::new();
        let immediate = registry.lookup(IMMEDIATE).unwrap();
        assert_eq!(immediate.kind(), ExecutorKind::Inline);
        assert_eq!(registry.names(), vec![IMMEDIATE.to_string()]);
    }

    #[test]
    fn build_with_limits_creates_bounded_pool() {
        let registry = ExecutorRegistry::new();
        let built = registry.build("io", NonZeroUsize::new(7), Some(300));
        let found = registry.lookup("io").unwrap();

        assert!(built.ptr_eq(&found));
        assert_eq!(found.kind(), ExecutorKind::BoundedPool);
        assert_eq!(found.limits().max_threads, NonZeroUsize::new(7));
        assert_eq!(found.limits().max_queue, Some(300));
    }

    #[test]
    fn build_without_limits_creates_unbounded_pool() {
        let registry = ExecutorRegistry::new();
        let built = registry.build("cached", None, None);
        assert_eq!(built.kind(), ExecutorKind::UnboundedPool);
    }

    #[test]
    fn build_replaces_previous_entry() {
        let registry = ExecutorRegistry::new();
        let first = registry.build("io", NonZeroUsize::new(1), Some(0));
        let second = registry.build("io", NonZeroUsize::new(2), Some(0));

        let found = registry.lookup("io").unwrap();
        assert!(found.ptr_eq(&second));
        assert!(!found.ptr_eq(&first));
    }

    #[test]
    fn lookup_unknown_name_fails() {
        let registry = ExecutorRegistry::new();
        let err = registry.lookup("missing").unwrap_err();
        assert!(matches!(err, WeftError::UnknownExecutor(name) if name == "missing"));
    }

    #[test]
    fn stats_cover_every_executor() {
        let registry = ExecutorRegistry::new();
        registry.build("x", NonZeroUsize::new(5), Some(100));
        let stats = registry.stats();

        assert_eq!(stats[IMMEDIATE], ExecutorStats::INLINE);
        let x = stats["x"];
        assert_eq!(x.maximum_active_tasks, 5);
        assert_eq!(x.maximum_queued_tasks, 100);
        assert_eq!(x.largest_concurrency, 0);
        assert_eq!(x.completed, 0);
        assert_eq!(x.pending, 0);
        assert_eq!(x.active, 0);
    }

    #[test]
    fn stats_track_work_through_a_built_pool() {
        let registry = ExecutorRegistry::new();
        let handle = registry.build("x", NonZeroUsize::new(2), Some(10));
        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            handle.post(move || tx.send(i).unwrap());
        }
        let mut seen: Vec<i32> = rx.iter().take(4).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        while registry.stats()["x"].completed < 4 {
            thread::yield_now();
        }
        let x = registry.stats()["x"];
        assert_eq!(x.active, 0);
        assert_eq!(x.pending, 0);
        assert!(x.largest_concurrency >= 1 && x.largest_concurrency <= 2);
    }

    #[test]
    fn shutdown_terminates_all_pools() {
        let registry = ExecutorRegistry::new();
        let handle = registry.build("x", None, None);
        let (tx, rx) = mpsc::channel();
        handle.post(move || tx.send(()).unwrap());
        rx.recv().unwrap();

        assert!(registry.shutdown(Duration::from_secs(5)));
    }
}
