//! Futures - Observation を作る入口
//!
//! `Futures` owns the process-wide defaults (the registry, the shared
//! unbounded pool, the inline executor, the clock) and is passed around by
//! value; nothing here reads global state.
//!
//! # 使用例
//! ```ignore
//! let futures = Futures::new(Arc::new(ExecutorRegistry::new()));
//! let total = futures
//!     .apply(FutureOptions::on("io"), || Ok(read_rows()?.len()))
//!     .then(|n| Ok(n * 2));
//! assert_eq!(total.get()?, 84);
//! ```

use std::sync::Arc;

use crate::domain::Fault;
use crate::executor::{DEFAULT, ExecutorHandle, ExecutorRegistry, IMMEDIATE};
use crate::error::WeftError;
use crate::observation::{self, Observation, capture};
use crate::ports::{Clock, SystemClock};
use crate::resolvable::ResolvableValue;

/// Which executor a block should run on.
#[derive(Debug, Clone, Default)]
pub enum ExecutorRef {
    /// The facade's default pool.
    #[default]
    Default,
    /// Looked up in the registry when the block is submitted.
    Named(String),
    Handle(ExecutorHandle),
}

impl From<&str> for ExecutorRef {
    fn from(name: &str) -> Self {
        ExecutorRef::Named(name.to_string())
    }
}

impl From<String> for ExecutorRef {
    fn from(name: String) -> Self {
        ExecutorRef::Named(name)
    }
}

impl From<ExecutorHandle> for ExecutorRef {
    fn from(handle: ExecutorHandle) -> Self {
        ExecutorRef::Handle(handle)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FutureOptions {
    pub executor: ExecutorRef,
}

impl FutureOptions {
    pub fn on(executor: impl Into<ExecutorRef>) -> Self {
        Self {
            executor: executor.into(),
        }
    }
}

/// Result of a `successive` block: a plain value, or another observation to
/// follow.
pub enum Next<T> {
    Value(T),
    Pending(Observation<T>),
}

impl<T> From<Observation<T>> for Next<T> {
    fn from(observation: Observation<T>) -> Self {
        Next::Pending(observation)
    }
}

#[derive(Clone)]
pub struct Futures {
    registry: Arc<ExecutorRegistry>,
    default_executor: ExecutorHandle,
    immediate: ExecutorHandle,
    clock: Arc<dyn Clock>,
}

impl Futures {
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock))
    }

    /// Registers the shared unbounded pool under `"default"` unless the
    /// registry already has one.
    pub fn with_clock(registry: Arc<ExecutorRegistry>, clock: Arc<dyn Clock>) -> Self {
        let default_executor = registry.get_or_build_unbounded(DEFAULT);
        let immediate = registry
            .lookup(IMMEDIATE)
            .unwrap_or_else(|_| ExecutorHandle::inline());
        Self {
            registry,
            default_executor,
            immediate,
            clock,
        }
    }

    /// Use `executor` instead of the shared pool when no executor is given.
    pub fn with_default_executor(mut self, executor: ExecutorHandle) -> Self {
        self.default_executor = executor;
        self
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn default_executor(&self) -> &ExecutorHandle {
        &self.default_executor
    }

    pub fn immediate_executor(&self) -> &ExecutorHandle {
        &self.immediate
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn constant<T>(&self, result: Result<T, Fault>) -> Observation<T>
    where
        T: Clone + Send + 'static,
    {
        let now = self.clock.now();
        Observation::with_clock(
            self.immediate.clone(),
            ResolvableValue::constant(now, result),
            now,
            Arc::clone(&self.clock),
        )
    }

    pub fn value<T>(&self, value: T) -> Observation<T>
    where
        T: Clone + Send + 'static,
    {
        self.constant(Ok(value))
    }

    pub fn none<T>(&self) -> Observation<Option<T>>
    where
        T: Clone + Send + 'static,
    {
        self.constant(Ok(None))
    }

    pub fn error<T>(&self, fault: impl Into<Fault>) -> Observation<T>
    where
        T: Clone + Send + 'static,
    {
        self.constant(Err(fault.into()))
    }

    /// Run `block` now, on this thread. See [`Observation::immediate`].
    pub fn immediate<T, F>(&self, block: F) -> Observation<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, Fault>,
    {
        Observation::immediate(self.immediate.clone(), Arc::clone(&self.clock), block)
    }

    pub fn resolve_executor(&self, executor: &ExecutorRef) -> Result<ExecutorHandle, WeftError> {
        match executor {
            ExecutorRef::Default => Ok(self.default_executor.clone()),
            ExecutorRef::Named(name) => self.registry.lookup(name),
            ExecutorRef::Handle(handle) => Ok(handle.clone()),
        }
    }

    /// Pending observation on the requested executor, or a rejected one if
    /// the executor name is unknown.
    fn launch<T>(&self, options: &FutureOptions) -> Result<Observation<T>, Observation<T>>
    where
        T: Clone + Send + 'static,
    {
        match self.resolve_executor(&options.executor) {
            Ok(executor) => Ok(Observation::pending(executor, Arc::clone(&self.clock))),
            Err(e) => {
                tracing::warn!(error = %e, "cannot schedule block");
                Err(self.error(e))
            }
        }
    }

    /// Post `block` to the chosen executor; the observation resolves with
    /// its result.
    pub fn apply<T, F>(&self, options: FutureOptions, block: F) -> Observation<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, Fault> + Send + 'static,
    {
        let observation = match self.launch::<T>(&options) {
            Ok(observation) => observation,
            Err(rejected) => return rejected,
        };
        let target = observation.resolvable().clone();
        observation.executor().post(move || {
            let _ = target.complete(capture(block));
        });
        observation
    }

    /// `apply` on the default executor.
    pub fn spawn<T, F>(&self, block: F) -> Observation<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, Fault> + Send + 'static,
    {
        self.apply(FutureOptions::default(), block)
    }

    /// Like `apply`, but a block that returns another observation resolves
    /// the outer one with the inner outcome.
    pub fn successive<T, F>(&self, options: FutureOptions, block: F) -> Observation<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<Next<T>, Fault> + Send + 'static,
    {
        let observation = match self.launch::<T>(&options) {
            Ok(observation) => observation,
            Err(rejected) => return rejected,
        };
        let target = observation.resolvable().clone();
        observation.executor().post(move || match capture(block) {
            Ok(Next::Value(value)) => {
                let _ = target.resolve(value);
            }
            Ok(Next::Pending(inner)) => {
                inner.resolvable().add_observer(move |resolution| {
                    let _ = target.complete(resolution.result.clone());
                });
            }
            Err(fault) => {
                let _ = target.reject(fault);
            }
        });
        observation
    }

    /// Gather `inputs` into one observation of their values, in input order.
    pub fn all<T, I>(&self, inputs: I) -> Observation<Vec<T>>
    where
        T: Clone + Send + 'static,
        I: IntoIterator<Item = Observation<T>>,
    {
        observation::all(
            inputs.into_iter().collect(),
            self.immediate.clone(),
            Arc::clone(&self.clock),
        )
    }
}
