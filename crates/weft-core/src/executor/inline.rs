//! Inline executor: runs each job on the posting thread, before `post` returns.

use std::panic::{self, AssertUnwindSafe};

use super::{Executor, ExecutorKind, ExecutorLimits, ExecutorStats, Job};

#[derive(Debug, Default)]
pub struct InlineExecutor;

impl InlineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for InlineExecutor {
    fn post(&self, job: Job) {
        // A panicking continuation must not unwind into whoever resolved the value.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let fault = crate::domain::Fault::from_panic(payload);
            tracing::error!(executor = "inline", %fault, "job panicked");
        }
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Inline
    }

    fn limits(&self) -> ExecutorLimits {
        ExecutorLimits::bounded(std::num::NonZeroUsize::new(1), Some(0))
    }

    fn stats(&self) -> ExecutorStats {
        ExecutorStats::INLINE
    }
}
