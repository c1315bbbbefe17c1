//! Async bridge: `.await` an observation from tokio code.
//!
//! The observation's own executor is not involved; the oneshot sender is
//! registered directly on the resolvable, so awaiting never parks a runtime
//! thread.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::Observation;
use crate::domain::Fault;
use crate::error::WeftError;

pub struct ObservationFuture<T> {
    rx: oneshot::Receiver<Result<T, Fault>>,
}

impl<T: Clone + Send + 'static> IntoFuture for Observation<T> {
    type Output = Result<T, Fault>;
    type IntoFuture = ObservationFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        let (tx, rx) = oneshot::channel();
        self.resolvable().add_observer(move |resolution| {
            // ignore send error: the awaiting side may have been dropped
            let _ = tx.send(resolution.result.clone());
        });
        ObservationFuture { rx }
    }
}

impl<T> Future for ObservationFuture<T> {
    type Output = Result<T, Fault>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(WeftError::Abandoned.into())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::domain::Fault;
    use crate::error::WeftError;
    use crate::executor::ExecutorHandle;
    use crate::observation::Observation;
    use crate::ports::SystemClock;
    use crate::resolvable::ResolvableValue;

    #[tokio::test]
    async fn awaits_an_already_resolved_observation() {
        let obs = Observation::new(
            ExecutorHandle::inline(),
            ResolvableValue::fulfilled(Utc::now(), 12),
            Utc::now(),
        );
        assert_eq!(obs.await.unwrap(), 12);
    }

    #[tokio::test]
    async fn awaits_resolution_from_a_blocking_thread() {
        let obs = Observation::<String>::pending(ExecutorHandle::inline(), Arc::new(SystemClock));
        let producer = obs.resolvable().clone();
        let chained = obs.map(|s| s.len());

        tokio::task::spawn_blocking(move || producer.resolve("hello".to_string()).unwrap());
        assert_eq!(chained.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn surfaces_the_original_fault() {
        let fault: Fault = WeftError::UnknownExecutor("gpu".into()).into();
        let obs = Observation::<i32>::new(
            ExecutorHandle::inline(),
            ResolvableValue::rejected(Utc::now(), fault.clone()),
            Utc::now(),
        );
        assert!(obs.await.unwrap_err().ptr_eq(&fault));
    }

    #[tokio::test]
    async fn dropped_producer_reports_abandoned() {
        let obs = Observation::<i32>::pending(ExecutorHandle::inline(), Arc::new(SystemClock));
        let err = obs.await.unwrap_err();
        assert!(matches!(err.downcast_ref::<WeftError>(), Some(WeftError::Abandoned)));
    }
}
