//! `all`: gather several observations into one.
//!
//! Outcome rule: scan inputs in list order. The first input that is still
//! pending stops the scan (wait); the first rejected input decides the
//! aggregate's fault; if every input is fulfilled the aggregate resolves to
//! their values in list order. This is what awaiting the inputs one by one
//! would produce, without blocking a thread to do it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Observation, settle};
use crate::domain::Fault;
use crate::executor::ExecutorHandle;
use crate::ports::Clock;
use crate::resolvable::ResolvableValue;

struct Gather<T> {
    slots: Vec<Option<Result<T, Fault>>>,
    settled: bool,
}

impl<T: Clone> Gather<T> {
    fn decide(&self) -> Option<Result<Vec<T>, Fault>> {
        let mut values = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match slot {
                None => return None,
                Some(Err(fault)) => return Some(Err(fault.clone())),
                Some(Ok(value)) => values.push(value.clone()),
            }
        }
        Some(Ok(values))
    }
}

pub(crate) fn all<T>(
    inputs: Vec<Observation<T>>,
    executor: ExecutorHandle,
    clock: Arc<dyn Clock>,
) -> Observation<Vec<T>>
where
    T: Clone + Send + 'static,
{
    let Some(initialized_at) = inputs.iter().map(Observation::initialized_at).min() else {
        let now = clock.now();
        return Observation::with_clock(
            executor,
            ResolvableValue::fulfilled(now, Vec::new()),
            now,
            clock,
        );
    };

    let aggregate = Observation::with_clock(
        executor,
        ResolvableValue::deferred(Arc::clone(&clock)),
        initialized_at,
        clock,
    );
    let gather = Arc::new(Mutex::new(Gather {
        slots: (0..inputs.len()).map(|_| None).collect(),
        settled: false,
    }));

    for (index, input) in inputs.iter().enumerate() {
        let gather = Arc::clone(&gather);
        let target = aggregate.resolvable().clone();
        input.resolvable().add_observer(move |resolution| {
            let outcome = {
                let mut gather = gather.lock();
                if gather.settled {
                    return;
                }
                gather.slots[index] = Some(resolution.result.clone());
                let Some(outcome) = gather.decide() else {
                    return;
                };
                gather.settled = true;
                outcome
            };
            settle(&target, outcome);
        });
    }
    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    use crate::domain::ResolutionState;
    use crate::error::WeftError;
    use crate::ports::SystemClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }

    fn pending<T: Clone + Send + 'static>() -> Observation<T> {
        Observation::pending(ExecutorHandle::inline(), clock())
    }

    #[test]
    fn empty_input_resolves_to_empty_vec() {
        let obs = all::<i32>(Vec::new(), ExecutorHandle::inline(), clock());
        assert!(obs.is_resolved());
        assert_eq!(obs.get().unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn values_keep_input_order_regardless_of_completion_order() {
        let a = pending::<&str>();
        let b = pending::<&str>();
        let obs = all(vec![a.clone(), b.clone()], ExecutorHandle::inline(), clock());

        b.resolvable().resolve("second").unwrap();
        assert_eq!(obs.state(), ResolutionState::Pending);
        a.resolvable().resolve("first").unwrap();

        assert_eq!(obs.get().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn lowest_index_fault_wins_even_if_it_fails_last() {
        let a = pending::<i32>();
        let b = pending::<i32>();
        let obs = all(vec![a.clone(), b.clone()], ExecutorHandle::inline(), clock());

        let late: Fault = WeftError::Abandoned.into();
        b.resolvable().reject(WeftError::UnknownExecutor("b".into()).into()).unwrap();
        assert_eq!(obs.state(), ResolutionState::Pending);
        a.resolvable().reject(late.clone()).unwrap();

        assert!(obs.get().unwrap_err().ptr_eq(&late));
    }

    #[test]
    fn rejects_without_waiting_for_later_inputs() {
        let a = pending::<i32>();
        let b = pending::<i32>();
        let obs = all(vec![a.clone(), b.clone()], ExecutorHandle::inline(), clock());

        let fault: Fault = WeftError::Abandoned.into();
        a.resolvable().reject(fault.clone()).unwrap();

        assert_eq!(b.state(), ResolutionState::Pending);
        assert!(obs.get().unwrap_err().ptr_eq(&fault));
    }

    #[test]
    fn initialized_at_is_the_earliest_input() {
        let now = Utc::now();
        let at = |offset: i64, v: i32| {
            Observation::new(
                ExecutorHandle::inline(),
                ResolvableValue::fulfilled(now, v),
                now + TimeDelta::seconds(offset),
            )
        };

        let behind = all(vec![at(0, 1), at(-3, 2)], ExecutorHandle::inline(), clock());
        assert_eq!(behind.initialized_at(), now - TimeDelta::seconds(3));

        let ahead = all(vec![at(0, 1), at(71, 2)], ExecutorHandle::inline(), clock());
        assert_eq!(ahead.initialized_at(), now);
    }
}
