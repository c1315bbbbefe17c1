//! Single-assignment value with resolution observers.
//!
//! A `ResolvableValue` starts either pending (deferred) or already resolved
//! (constant). The pending -> resolved transition happens under the slot
//! lock, so concurrent resolvers are serialized and only the first wins.
//! Observers registered while pending are drained exactly once, outside the
//! lock, in registration order. Observers registered after resolution run
//! immediately on the registering thread.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};

use crate::domain::{Fault, Resolution, ResolutionState};
use crate::error::WeftError;
use crate::ports::{Clock, SystemClock};

type ResolutionObserver<T> = Box<dyn FnOnce(&Resolution<T>) + Send + 'static>;

enum Slot<T> {
    Pending(Vec<ResolutionObserver<T>>),
    Resolved(Resolution<T>),
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    resolved: Condvar,
    clock: Arc<dyn Clock>,
}

/// Shared handle to a single-assignment value. Clones observe the same slot.
pub struct ResolvableValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResolvableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ResolvableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvableValue")
            .field("state", &self.state())
            .finish()
    }
}

impl<T> ResolvableValue<T> {
    /// Pending value, resolved later by the producer. `resolved_at` is read
    /// from `clock` at the moment of resolution.
    pub fn deferred(clock: Arc<dyn Clock>) -> Self {
        Self::with_slot(Slot::Pending(Vec::new()), clock)
    }

    /// Value that is resolved from the start.
    pub fn constant(resolved_at: DateTime<Utc>, result: Result<T, Fault>) -> Self {
        Self::with_slot(
            Slot::Resolved(Resolution::new(result, resolved_at)),
            Arc::new(SystemClock),
        )
    }

    pub fn fulfilled(resolved_at: DateTime<Utc>, value: T) -> Self {
        Self::constant(resolved_at, Ok(value))
    }

    pub fn rejected(resolved_at: DateTime<Utc>, fault: Fault) -> Self {
        Self::constant(resolved_at, Err(fault))
    }

    fn with_slot(slot: Slot<T>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(slot),
                resolved: Condvar::new(),
                clock,
            }),
        }
    }

    pub fn state(&self) -> ResolutionState {
        match &*self.inner.slot.lock() {
            Slot::Pending(_) => ResolutionState::Pending,
            Slot::Resolved(resolution) => resolution.state(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn resolve(&self, value: T) -> Result<(), WeftError>
    where
        T: Clone,
    {
        self.complete(Ok(value))
    }

    pub fn reject(&self, fault: Fault) -> Result<(), WeftError>
    where
        T: Clone,
    {
        self.complete(Err(fault))
    }

    /// Transition pending -> fulfilled/rejected, then notify observers.
    ///
    /// A second attempt leaves the stored outcome untouched and returns
    /// `ResolutionConflict`.
    pub fn complete(&self, result: Result<T, Fault>) -> Result<(), WeftError>
    where
        T: Clone,
    {
        let resolved_at = self.inner.clock.now();
        let resolution = Resolution::new(result, resolved_at);

        let observers = {
            let mut slot = self.inner.slot.lock();
            match &mut *slot {
                Slot::Resolved(existing) => {
                    let state = existing.state();
                    tracing::error!(%state, "resolve attempted on an already resolved value");
                    return Err(WeftError::ResolutionConflict { state });
                }
                Slot::Pending(observers) => {
                    let observers = std::mem::take(observers);
                    *slot = Slot::Resolved(resolution.clone());
                    observers
                }
            }
        };
        self.inner.resolved.notify_all();

        for observer in observers {
            observer(&resolution);
        }
        Ok(())
    }

    /// Register `observer` to run once with the final resolution.
    ///
    /// Runs synchronously, on the calling thread, if already resolved.
    pub fn add_observer<F>(&self, observer: F)
    where
        F: FnOnce(&Resolution<T>) + Send + 'static,
        T: Clone,
    {
        let resolution = {
            let mut slot = self.inner.slot.lock();
            match &mut *slot {
                Slot::Pending(observers) => {
                    observers.push(Box::new(observer));
                    return;
                }
                Slot::Resolved(resolution) => resolution.clone(),
            }
        };
        observer(&resolution);
    }

    /// Resolution, if it already happened.
    pub fn try_resolution(&self) -> Option<Resolution<T>>
    where
        T: Clone,
    {
        match &*self.inner.slot.lock() {
            Slot::Pending(_) => None,
            Slot::Resolved(resolution) => Some(resolution.clone()),
        }
    }

    /// Block the calling thread until resolved.
    pub fn wait(&self) -> Resolution<T>
    where
        T: Clone,
    {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Slot::Resolved(resolution) = &*slot {
                return resolution.clone();
            }
            self.inner.resolved.wait(&mut slot);
        }
    }

    /// Block until resolved, then return the value or the stored fault.
    pub fn blocking_get(&self) -> Result<T, Fault>
    where
        T: Clone,
    {
        self.wait().result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, mpsc};
    use std::thread;

    use chrono::TimeDelta;

    use crate::ports::FixedClock;

    fn fixed_clock() -> (Arc<FixedClock>, DateTime<Utc>) {
        let start = Utc::now();
        (Arc::new(FixedClock::new(start)), start)
    }

    #[test]
    fn deferred_starts_pending() {
        let (clock, _) = fixed_clock();
        let value = ResolvableValue::<i32>::deferred(clock);
        assert_eq!(value.state(), ResolutionState::Pending);
        assert!(value.try_resolution().is_none());
    }

    #[test]
    fn resolve_stamps_time_and_notifies_in_registration_order() {
        let (clock, start) = fixed_clock();
        let value = ResolvableValue::deferred(clock.clone());
        let (tx, rx) = mpsc::channel();

        for i in 0..3 {
            let tx = tx.clone();
            value.add_observer(move |resolution: &Resolution<&str>| {
                tx.send((i, resolution.result.clone().unwrap(), resolution.resolved_at))
                    .unwrap();
            });
        }

        let resolved_at = clock.advance(TimeDelta::seconds(3));
        value.resolve("done").unwrap();

        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![(0, "done", resolved_at), (1, "done", resolved_at), (2, "done", resolved_at)]
        );
        assert!(resolved_at > start);
        assert_eq!(value.state(), ResolutionState::Fulfilled);
    }

    #[test]
    fn second_resolution_is_a_conflict_and_keeps_first_outcome() {
        let (clock, _) = fixed_clock();
        let value = ResolvableValue::deferred(clock);
        value.resolve(1).unwrap();

        let err = value.resolve(2).unwrap_err();
        assert!(matches!(
            err,
            WeftError::ResolutionConflict { state: ResolutionState::Fulfilled }
        ));
        let err = value.reject(WeftError::Abandoned.into()).unwrap_err();
        assert!(matches!(err, WeftError::ResolutionConflict { .. }));
        assert_eq!(value.blocking_get().unwrap(), 1);
    }

    #[test]
    fn constant_rejects_resolution_attempts() {
        let value = ResolvableValue::fulfilled(Utc::now(), 5);
        assert!(value.resolve(6).is_err());
        assert_eq!(value.blocking_get().unwrap(), 5);
    }

    #[test]
    fn late_observer_runs_synchronously_with_stored_outcome() {
        let resolved_at = Utc::now();
        let fault: Fault = WeftError::Abandoned.into();
        let value = ResolvableValue::<i32>::rejected(resolved_at, fault.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let expected = fault.clone();
        value.add_observer(move |resolution| {
            assert!(resolution.result.as_ref().unwrap_err().ptr_eq(&expected));
            assert_eq!(resolution.resolved_at, resolved_at);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_get_waits_for_another_thread() {
        let (clock, _) = fixed_clock();
        let value = ResolvableValue::deferred(clock);
        let producer = value.clone();

        let handle = thread::spawn(move || producer.resolve(vec![1, 2, 3]).unwrap());
        assert_eq!(value.blocking_get().unwrap(), vec![1, 2, 3]);
        handle.join().unwrap();
    }

    #[test]
    fn concurrent_resolvers_have_exactly_one_winner() {
        let (clock, _) = fixed_clock();
        let value = ResolvableValue::deferred(clock);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        value.add_observer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let value = value.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    value.resolve(i).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }
}
