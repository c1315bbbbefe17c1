//! Domain model (faults, resolution state, timing).
//!
//! Executor-agnostic: nothing here knows about threads or pools.

pub mod fault;
pub mod state;

pub use fault::{Fault, Panicked};
pub use state::{Resolution, ResolutionState, Timing};
