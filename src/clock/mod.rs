//! Clock Driver Module
//!
//! Tick sources for a running session. A clock calls its tick handler once
//! per interval while started and not paused, and never replays ticks missed
//! while paused.
//!
//! # Components
//!
//! - [`IntervalClock`]: background thread ticking on a fixed interval (1 Hz
//!   by default)
//! - [`ManualClock`]: ticks delivered on demand, for tests and for embedders
//!   with their own timer

pub mod interval;
pub mod manual;

use std::sync::Arc;

pub use interval::{IntervalClock, IntervalClockFactory};
pub use manual::ManualClock;

/// Callback invoked once per tick.
pub type TickHandler = Arc<dyn Fn() + Send + Sync>;

/// A startable, pausable tick source.
///
/// `stop` is idempotent and releases the underlying timer resource; a
/// stopped clock never ticks again.
pub trait Clock: Send {
    fn start(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);

    /// Started, not paused, not stopped.
    fn is_ticking(&self) -> bool;
}

/// Builds one clock per session.
pub trait ClockFactory: Send + Sync {
    fn create(&self, on_tick: TickHandler) -> Box<dyn Clock>;
}
