//! Observation: a resolvable value bound to the executor its continuations
//! run on.
//!
//! Every continuation (`on_success`, `then`, `ensure`, ...) is registered
//! without blocking and its body is posted to the observation's own executor,
//! whichever thread did the resolving. Only `join`, `get` and `resolved_at`
//! block.
//!
//! Faults raised inside a transform (an `Err` return or a panic) are captured
//! and become the rejection of the derived observation. They never unwind
//! into the thread that resolved the source.

mod aggregate;
mod bridge;
mod observer;

pub use self::bridge::ObservationFuture;
pub use self::observer::Observer;

pub(crate) use self::aggregate::all;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Fault, ResolutionState, Timing};
use crate::executor::ExecutorHandle;
use crate::ports::{Clock, SystemClock};
use crate::resolvable::ResolvableValue;

/// Values that have an explicit "absent" sentinel, for `none_fallback`.
///
/// Only the sentinel counts: `Some(0)`, `Some(vec![])` or `""` are present.
pub trait Absent {
    fn is_absent(&self) -> bool;
}

impl<T> Absent for Option<T> {
    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl Absent for serde_json::Value {
    fn is_absent(&self) -> bool {
        self.is_null()
    }
}

/// Run `block`, turning a panic into a `Fault`.
pub(crate) fn capture<T>(block: impl FnOnce() -> Result<T, Fault>) -> Result<T, Fault> {
    match panic::catch_unwind(AssertUnwindSafe(block)) {
        Ok(result) => result,
        Err(payload) => Err(Fault::from_panic(payload)),
    }
}

/// Resolve a derived observation's value. The target is always fresh, so a
/// conflict here is a bug; `complete` already logs it.
fn settle<T: Clone>(target: &ResolvableValue<T>, result: Result<T, Fault>) {
    let _ = target.complete(result);
}

pub struct Observation<T> {
    executor: ExecutorHandle,
    resolvable: ResolvableValue<T>,
    initialized_at: DateTime<Utc>,
    clock: Arc<dyn Clock>,
}

impl<T> Clone for Observation<T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            resolvable: self.resolvable.clone(),
            initialized_at: self.initialized_at,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<T> fmt::Debug for Observation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("executor", &self.executor.name())
            .field("state", &self.resolvable.state())
            .field("initialized_at", &self.initialized_at)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Observation<T> {
    pub fn new(
        executor: ExecutorHandle,
        resolvable: ResolvableValue<T>,
        initialized_at: DateTime<Utc>,
    ) -> Self {
        Self::with_clock(executor, resolvable, initialized_at, Arc::new(SystemClock))
    }

    /// `clock` stamps observations derived from this one.
    pub fn with_clock(
        executor: ExecutorHandle,
        resolvable: ResolvableValue<T>,
        initialized_at: DateTime<Utc>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor,
            resolvable,
            initialized_at,
            clock,
        }
    }

    /// Pending observation created now, resolved later through `resolvable()`.
    pub fn pending(executor: ExecutorHandle, clock: Arc<dyn Clock>) -> Self {
        let initialized_at = clock.now();
        let resolvable = ResolvableValue::deferred(Arc::clone(&clock));
        Self::with_clock(executor, resolvable, initialized_at, clock)
    }

    /// Run `block` on the calling thread and wrap its outcome.
    ///
    /// `initialized_at` is sampled right before `block` runs and
    /// `resolved_at` right after. A fault or panic in `block` is stored, not
    /// raised.
    pub fn immediate<F>(executor: ExecutorHandle, clock: Arc<dyn Clock>, block: F) -> Self
    where
        F: FnOnce() -> Result<T, Fault>,
    {
        let started_at = clock.now();
        let result = capture(block);
        let completed_at = clock.now();
        Self::with_clock(
            executor,
            ResolvableValue::constant(completed_at, result),
            started_at,
            clock,
        )
    }

    fn derive<U: Clone + Send + 'static>(&self) -> Observation<U> {
        Observation::pending(self.executor.clone(), Arc::clone(&self.clock))
    }

    pub fn executor(&self) -> &ExecutorHandle {
        &self.executor
    }

    pub fn resolvable(&self) -> &ResolvableValue<T> {
        &self.resolvable
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }

    pub fn state(&self) -> ResolutionState {
        self.resolvable.state()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolvable.is_resolved()
    }

    /// Run `f(value)` on the executor if this resolves successfully.
    pub fn on_success<F>(&self, f: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        let executor = self.executor.clone();
        self.resolvable.add_observer(move |resolution| {
            if let Ok(value) = &resolution.result {
                let value = value.clone();
                executor.post(move || f(value));
            }
        });
        self
    }

    /// Run `f(fault)` on the executor if this is rejected.
    pub fn on_failure<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Fault) + Send + 'static,
    {
        let executor = self.executor.clone();
        self.resolvable.add_observer(move |resolution| {
            if let Err(fault) = &resolution.result {
                let fault = fault.clone();
                executor.post(move || f(fault));
            }
        });
        self
    }

    pub fn on_complete<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Result<T, Fault>) + Send + 'static,
    {
        let executor = self.executor.clone();
        self.resolvable.add_observer(move |resolution| {
            let result = resolution.result.clone();
            executor.post(move || f(result));
        });
        self
    }

    /// Run `f` with start/end timestamps and the outcome once resolved.
    pub fn on_timed<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Timing, Result<T, Fault>) + Send + 'static,
    {
        let executor = self.executor.clone();
        let started_at = self.initialized_at;
        self.resolvable.add_observer(move |resolution| {
            let timing = Timing::between(started_at, resolution.resolved_at);
            let result = resolution.result.clone();
            executor.post(move || f(timing, result));
        });
        self
    }

    /// Block until resolved. The outcome is not inspected.
    pub fn join(&self) -> &Self {
        self.resolvable.wait();
        self
    }

    /// Block until resolved; the value, or the original fault.
    pub fn get(&self) -> Result<T, Fault> {
        self.resolvable.blocking_get()
    }

    /// Block until resolved; when it happened.
    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolvable.wait().resolved_at
    }

    /// Chain a fallible transform. Faults skip `f` and pass through as-is.
    pub fn then<U, F>(&self, f: F) -> Observation<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Fault> + Send + 'static,
    {
        let next = self.derive::<U>();
        let target = next.resolvable.clone();
        self.on_complete(move |result| {
            let outcome = match result {
                Ok(value) => capture(|| f(value)),
                Err(fault) => Err(fault),
            };
            settle(&target, outcome);
        });
        next
    }

    /// Infallible `then`.
    pub fn map<U, F>(&self, f: F) -> Observation<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Ok(f(value)))
    }

    /// Replace a fault with the value computed by `f`. Success passes through.
    pub fn fallback<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce(Fault) -> Result<T, Fault> + Send + 'static,
    {
        let next = self.derive::<T>();
        let target = next.resolvable.clone();
        self.on_complete(move |result| {
            let outcome = match result {
                Ok(value) => Ok(value),
                Err(fault) => capture(|| f(fault)),
            };
            settle(&target, outcome);
        });
        next
    }

    /// Substitute `default` for an absent value.
    pub fn none_fallback(&self, default: T) -> Observation<T>
    where
        T: Absent,
    {
        self.none_fallback_with(move || default)
    }

    /// Substitute `f()` for an absent value. Anything else, faults included,
    /// passes through.
    pub fn none_fallback_with<F>(&self, f: F) -> Observation<T>
    where
        T: Absent,
        F: FnOnce() -> T + Send + 'static,
    {
        let next = self.derive::<T>();
        let target = next.resolvable.clone();
        self.on_complete(move |result| {
            let outcome = match result {
                Ok(value) if value.is_absent() => capture(|| Ok(f())),
                other => other,
            };
            settle(&target, outcome);
        });
        next
    }

    /// Run `f` once resolved, whatever the outcome, then pass the outcome on.
    pub fn ensure<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pass_through(move |_| f())
    }

    /// Run `f(value)` on success; the returned observation resolves with the
    /// original outcome after `f` ran (or was skipped).
    pub fn on_success_ensure<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.pass_through(move |result| {
            if let Ok(value) = result {
                f(value.clone());
            }
        })
    }

    /// Failure counterpart of `on_success_ensure`.
    pub fn on_failure_ensure<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce(Fault) + Send + 'static,
    {
        self.pass_through(move |result| {
            if let Err(fault) = result {
                f(fault.clone());
            }
        })
    }

    fn pass_through<F>(&self, side_effect: F) -> Observation<T>
    where
        F: FnOnce(&Result<T, Fault>) + Send + 'static,
    {
        let next = self.derive::<T>();
        let target = next.resolvable.clone();
        self.on_complete(move |result| {
            if let Err(fault) = capture(|| {
                side_effect(&result);
                Ok(())
            }) {
                tracing::error!(%fault, "ensure callback failed; passing original outcome on");
            }
            settle(&target, result);
        });
        next
    }
}
