//! Manual Clock
//!
//! A clock whose ticks are delivered by calling [`ManualClock::tick`]. The
//! handle doubles as a [`ClockFactory`]; every clock it creates shares the
//! handle's state, and creating a new clock retires the previous one.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Clock, ClockFactory, TickHandler};

#[derive(Default)]
struct Shared {
    generation: u64,
    started: bool,
    paused: bool,
    stopped: bool,
    starts: usize,
    on_tick: Option<TickHandler>,
}

/// Handle for delivering synthetic ticks.
#[derive(Clone, Default)]
pub struct ManualClock {
    shared: Arc<Mutex<Shared>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Delivers one tick. Returns false when the clock is not ticking.
    pub fn tick(&self) -> bool {
        let handler = {
            let shared = self.lock();
            if !(shared.started && !shared.paused && !shared.stopped) {
                return false;
            }
            shared.on_tick.clone()
        };

        match handler {
            Some(on_tick) => {
                on_tick();
                true
            }
            None => false,
        }
    }

    /// Delivers `n` ticks and returns how many were accepted.
    pub fn advance(&self, n: usize) -> usize {
        (0..n).filter(|_| self.tick()).count()
    }

    pub fn is_ticking(&self) -> bool {
        let shared = self.lock();
        shared.started && !shared.paused && !shared.stopped
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Number of clocks started through this handle.
    pub fn starts(&self) -> usize {
        self.lock().starts
    }
}

impl ClockFactory for ManualClock {
    fn create(&self, on_tick: TickHandler) -> Box<dyn Clock> {
        let mut shared = self.lock();
        shared.generation += 1;
        shared.started = false;
        shared.paused = false;
        shared.stopped = false;
        shared.on_tick = Some(on_tick);

        Box::new(ManualClockInstance {
            generation: shared.generation,
            shared: Arc::clone(&self.shared),
        })
    }
}

struct ManualClockInstance {
    generation: u64,
    shared: Arc<Mutex<Shared>>,
}

impl ManualClockInstance {
    /// Applies `f` only if this instance is still the current clock.
    fn with_current(&self, f: impl FnOnce(&mut Shared)) {
        let mut shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
        if shared.generation == self.generation && !shared.stopped {
            f(&mut shared);
        }
    }
}

impl Clock for ManualClockInstance {
    fn start(&mut self) {
        self.with_current(|s| {
            if !s.started {
                s.started = true;
                s.starts += 1;
            }
        });
    }

    fn pause(&mut self) {
        self.with_current(|s| s.paused = true);
    }

    fn resume(&mut self) {
        self.with_current(|s| s.paused = false);
    }

    fn stop(&mut self) {
        self.with_current(|s| {
            s.stopped = true;
            s.on_tick = None;
        });
    }

    fn is_ticking(&self) -> bool {
        let shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
        shared.generation == self.generation
            && shared.started
            && !shared.paused
            && !shared.stopped
    }
}

impl Drop for ManualClockInstance {
    fn drop(&mut self) {
        self.stop();
    }
}
