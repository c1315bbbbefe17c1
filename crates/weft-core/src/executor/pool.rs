//! Worker pool with lazy threads, idle retirement and overflow-to-caller.
//!
//! Dispatch order for a posted job:
//! 1. an idle worker is waiting -> hand it the job through the queue
//! 2. below the thread cap -> spawn a worker for it
//! 3. below the queue cap -> queue it
//! 4. otherwise run it on the posting thread (never block, never drop)
//!
//! Workers that stay idle for `idle_timeout` exit, so a pool holds no threads
//! while unused.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{Executor, ExecutorKind, ExecutorLimits, ExecutorStats, Job};
use crate::domain::Fault;

/// Raw pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounters {
    pub scheduled: u64,
    pub completed: u64,
    pub queue_length: usize,
    pub largest_concurrency: usize,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    largest: usize,
    scheduled: u64,
    completed: u64,
    next_worker_id: u64,
    shutdown: bool,
}

struct Shared {
    name: String,
    limits: ExecutorLimits,
    idle_timeout: Duration,
    state: Mutex<PoolState>,
    work_available: Condvar,
    terminated: Condvar,
}

impl Shared {
    fn has_thread_capacity(&self, workers: usize) -> bool {
        self.limits.max_threads.is_none_or(|max| workers < max.get())
    }

    fn has_queue_capacity(&self, queued: usize) -> bool {
        self.limits.max_queue.is_none_or(|max| queued < max)
    }

    fn run_job(&self, job: Job) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let fault = Fault::from_panic(payload);
            tracing::error!(pool = %self.name, %fault, "job panicked");
        }
        self.state.lock().completed += 1;
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    pub fn new(name: impl Into<String>, limits: ExecutorLimits, idle_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                limits,
                idle_timeout,
                state: Mutex::new(PoolState::default()),
                work_available: Condvar::new(),
                terminated: Condvar::new(),
            }),
        }
    }

    pub fn unbounded(name: impl Into<String>, idle_timeout: Duration) -> Self {
        Self::new(name, ExecutorLimits::unbounded(), idle_timeout)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn counters(&self) -> PoolCounters {
        let state = self.shared.state.lock();
        PoolCounters {
            scheduled: state.scheduled,
            completed: state.completed,
            queue_length: state.queue.len(),
            largest_concurrency: state.largest,
        }
    }

    /// Live worker threads, busy or idle.
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle
    }

    fn run_on_caller(&self, job: Job) {
        tracing::debug!(pool = %self.shared.name, "running job on caller");
        self.shared.run_job(job);
    }

    fn spawn_worker(&self, worker_id: u64) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-worker-{worker_id}", self.shared.name))
            .spawn(move || worker_loop(shared, worker_id));

        if let Err(e) = spawned {
            tracing::error!(pool = %self.shared.name, error = %e, "failed to spawn worker");
            // Whatever was queued for this worker must still run somewhere.
            let orphaned: Vec<Job> = {
                let mut state = self.shared.state.lock();
                state.workers -= 1;
                if state.workers == 0 {
                    state.queue.drain(..).collect()
                } else {
                    Vec::new()
                }
            };
            for job in orphaned {
                self.run_on_caller(job);
            }
        }
    }
}

impl Executor for ThreadPool {
    fn post(&self, job: Job) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        state.scheduled += 1;

        if state.shutdown {
            drop(state);
            self.run_on_caller(job);
            return;
        }

        if state.idle > state.queue.len() {
            state.queue.push_back(job);
            drop(state);
            shared.work_available.notify_one();
            return;
        }

        if shared.has_thread_capacity(state.workers) {
            state.workers += 1;
            state.largest = state.largest.max(state.workers);
            let worker_id = state.next_worker_id;
            state.next_worker_id += 1;
            state.queue.push_back(job);
            drop(state);
            self.spawn_worker(worker_id);
            return;
        }

        if shared.has_queue_capacity(state.queue.len()) {
            state.queue.push_back(job);
            drop(state);
            shared.work_available.notify_one();
            return;
        }

        drop(state);
        self.run_on_caller(job);
    }

    fn kind(&self) -> ExecutorKind {
        if self.shared.limits.is_unbounded() {
            ExecutorKind::UnboundedPool
        } else {
            ExecutorKind::BoundedPool
        }
    }

    fn limits(&self) -> ExecutorLimits {
        self.shared.limits
    }

    fn stats(&self) -> ExecutorStats {
        ExecutorStats::from_counters(self.shared.limits, self.counters())
    }

    fn shutdown(&self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work_available.notify_all();
        tracing::debug!(pool = %self.shared.name, "shutdown requested");
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.workers > 0 {
            if self
                .shared
                .terminated
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.workers == 0;
            }
        }
        true
    }
}

fn worker_loop(shared: Arc<Shared>, worker_id: u64) {
    tracing::debug!(pool = %shared.name, worker_id, "worker started");
    while let Some(job) = next_job(&shared) {
        shared.run_job(job);
    }
    tracing::debug!(pool = %shared.name, worker_id, "worker retired");
}

/// Next job for a worker, or `None` once the worker has retired.
///
/// Retirement is counted under the same lock as the decision to retire, so a
/// concurrent `post` either sees this worker idle or sees room to spawn one.
fn next_job(shared: &Shared) -> Option<Job> {
    let mut state = shared.state.lock();
    loop {
        if let Some(job) = state.queue.pop_front() {
            return Some(job);
        }
        if !state.shutdown {
            state.idle += 1;
            let timed_out = shared
                .work_available
                .wait_for(&mut state, shared.idle_timeout)
                .timed_out();
            state.idle -= 1;
            if !timed_out || !state.queue.is_empty() {
                continue;
            }
        }

        state.workers -= 1;
        if state.workers == 0 {
            shared.terminated.notify_all();
        }
        return None;
    }
}
