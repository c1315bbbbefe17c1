//! Observer: the observation capability set as a trait.
//!
//! Types that wrap an observation implement `observation()` and get the
//! whole continuation API by forwarding.

use chrono::{DateTime, Utc};

use super::{Absent, Observation};
use crate::domain::{Fault, Timing};

pub trait Observer<T: Clone + Send + 'static> {
    fn observation(&self) -> &Observation<T>;

    fn on_success<F>(&self, f: F) -> &Observation<T>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.observation().on_success(f)
    }

    fn on_failure<F>(&self, f: F) -> &Observation<T>
    where
        F: FnOnce(Fault) + Send + 'static,
    {
        self.observation().on_failure(f)
    }

    fn on_complete<F>(&self, f: F) -> &Observation<T>
    where
        F: FnOnce(Result<T, Fault>) + Send + 'static,
    {
        self.observation().on_complete(f)
    }

    fn on_timed<F>(&self, f: F) -> &Observation<T>
    where
        F: FnOnce(Timing, Result<T, Fault>) + Send + 'static,
    {
        self.observation().on_timed(f)
    }

    fn join(&self) -> &Observation<T> {
        self.observation().join()
    }

    fn get(&self) -> Result<T, Fault> {
        self.observation().get()
    }

    fn resolved_at(&self) -> DateTime<Utc> {
        self.observation().resolved_at()
    }

    fn then<U, F>(&self, f: F) -> Observation<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, Fault> + Send + 'static,
    {
        self.observation().then(f)
    }

    fn fallback<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce(Fault) -> Result<T, Fault> + Send + 'static,
    {
        self.observation().fallback(f)
    }

    fn none_fallback(&self, default: T) -> Observation<T>
    where
        T: Absent,
    {
        self.observation().none_fallback(default)
    }

    fn ensure<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce() + Send + 'static,
    {
        self.observation().ensure(f)
    }

    fn on_success_ensure<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.observation().on_success_ensure(f)
    }

    fn on_failure_ensure<F>(&self, f: F) -> Observation<T>
    where
        F: FnOnce(Fault) + Send + 'static,
    {
        self.observation().on_failure_ensure(f)
    }
}

impl<T: Clone + Send + 'static> Observer<T> for Observation<T> {
    fn observation(&self) -> &Observation<T> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::executor::ExecutorHandle;
    use crate::resolvable::ResolvableValue;

    /// A domain type that carries an observation and exposes its API.
    struct PendingQuery {
        rows: Observation<Option<u32>>,
    }

    impl Observer<Option<u32>> for PendingQuery {
        fn observation(&self) -> &Observation<Option<u32>> {
            &self.rows
        }
    }

    fn query(rows: Option<u32>) -> PendingQuery {
        PendingQuery {
            rows: Observation::new(
                ExecutorHandle::inline(),
                ResolvableValue::fulfilled(Utc::now(), rows),
                Utc::now(),
            ),
        }
    }

    #[test]
    fn forwards_to_the_wrapped_observation() {
        let q = query(Some(3));
        assert_eq!(Observer::get(&q).unwrap(), Some(3));
        assert_eq!(Observer::resolved_at(&q), q.rows.resolved_at());
        assert_eq!(Observer::then(&q, |rows| Ok(rows.map(|n| n * 2))).get().unwrap(), Some(6));

        let (tx, rx) = mpsc::channel();
        Observer::on_success(&q, move |rows| tx.send(rows).unwrap());
        assert_eq!(rx.try_recv().unwrap(), Some(3));
    }

    #[test]
    fn forwards_none_fallback() {
        let q = query(None);
        assert_eq!(Observer::none_fallback(&q, Some(0)).get().unwrap(), Some(0));
        assert!(Observer::join(&q).is_resolved());
    }
}
