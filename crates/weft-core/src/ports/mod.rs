//! Ports - 抽象化レイヤー
//!
//! Seams the core depends on but does not own: where time comes from and
//! where monitor entries go. In-process implementations live in `impls`.

pub mod clock;
pub mod log_sink;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::log_sink::LogSink;
