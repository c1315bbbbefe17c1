//! Resolution state machine for a single-assignment value.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::fault::Fault;

/// Resolution state.
///
/// State transitions:
/// - Pending -> Fulfilled
/// - Pending -> Rejected
///
/// Fulfilled and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Pending,
    Fulfilled,
    Rejected,
}

impl ResolutionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ResolutionState::Pending)
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionState::Pending => f.write_str("pending"),
            ResolutionState::Fulfilled => f.write_str("fulfilled"),
            ResolutionState::Rejected => f.write_str("rejected"),
        }
    }
}

/// Final outcome of a resolvable value, stamped with its resolution time.
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    pub result: Result<T, Fault>,
    pub resolved_at: DateTime<Utc>,
}

impl<T> Resolution<T> {
    pub fn new(result: Result<T, Fault>, resolved_at: DateTime<Utc>) -> Self {
        Self {
            result,
            resolved_at,
        }
    }

    pub fn state(&self) -> ResolutionState {
        match self.result {
            Ok(_) => ResolutionState::Fulfilled,
            Err(_) => ResolutionState::Rejected,
        }
    }
}

/// Timing metadata handed to `on_timed` continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration: TimeDelta,
}

impl Timing {
    pub fn between(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            completed_at,
            duration: completed_at - started_at,
        }
    }

    /// Duration in fractional seconds.
    pub fn duration_secs(&self) -> f64 {
        match self.duration.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            // Only reachable for spans beyond ~292 years.
            None => self.duration.num_milliseconds() as f64 / 1e3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeftError;

    #[test]
    fn pending_is_the_only_open_state() {
        assert!(!ResolutionState::Pending.is_terminal());
        assert!(ResolutionState::Fulfilled.is_terminal());
        assert!(ResolutionState::Rejected.is_terminal());
    }

    #[test]
    fn resolution_reports_state_from_result() {
        let now = Utc::now();
        assert_eq!(Resolution::new(Ok(1), now).state(), ResolutionState::Fulfilled);
        let rejected: Resolution<i32> = Resolution::new(Err(WeftError::Abandoned.into()), now);
        assert_eq!(rejected.state(), ResolutionState::Rejected);
    }

    #[test]
    fn timing_duration_in_seconds() {
        let started_at = Utc::now();
        let completed_at = started_at + TimeDelta::milliseconds(2_250);
        let timing = Timing::between(started_at, completed_at);
        assert_eq!(timing.duration, TimeDelta::milliseconds(2_250));
        assert!((timing.duration_secs() - 2.25).abs() < 1e-9);
    }
}
