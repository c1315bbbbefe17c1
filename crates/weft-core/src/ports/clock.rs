//! Clock port - 時刻の抽象化
//!
//! Every timestamp the crate records (creation, resolution, monitor samples)
//! is read through this trait so tests can pin time down.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Clock は現在時刻を提供
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock (本番用).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock (テスト用).
///
/// Returns the same instant until `set` or `advance` moves it.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, delta: TimeDelta) -> DateTime<Utc> {
        let mut now = self.now.lock();
        *now += delta;
        *now
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
