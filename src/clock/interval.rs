//! Interval Clock
//!
//! A background thread that ticks on a fixed interval. Control messages
//! (pause, resume, stop) arrive over a channel, so the thread sleeps in
//! `recv_timeout` instead of polling.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error};

use super::{Clock, ClockFactory, TickHandler};

/// Default tick interval (1 Hz).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

enum Control {
    Pause,
    Resume,
    Stop,
}

/// Thread-backed clock.
///
/// Dropping the clock stops it and joins the thread.
pub struct IntervalClock {
    interval: Duration,
    on_tick: TickHandler,
    control: Option<Sender<Control>>,
    handle: Option<JoinHandle<()>>,
    paused: bool,
    stopped: bool,
}

impl IntervalClock {
    pub fn new(interval: Duration, on_tick: TickHandler) -> Self {
        Self {
            interval,
            on_tick,
            control: None,
            handle: None,
            paused: false,
            stopped: false,
        }
    }

    fn send(&self, message: Control) {
        if let Some(ref tx) = self.control {
            // A closed channel means the thread already exited.
            let _ = tx.send(message);
        }
    }
}

impl Clock for IntervalClock {
    fn start(&mut self) {
        if self.handle.is_some() || self.stopped {
            return;
        }

        let (tx, rx) = channel();
        let interval = self.interval;
        let on_tick = self.on_tick.clone();

        let spawned = thread::Builder::new()
            .name("session-clock".to_string())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                let mut paused = false;

                loop {
                    if paused {
                        match rx.recv() {
                            Ok(Control::Resume) => {
                                paused = false;
                                deadline = Instant::now() + interval;
                            }
                            Ok(Control::Pause) => {}
                            Ok(Control::Stop) | Err(_) => return,
                        }
                        continue;
                    }

                    let wait = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Ok(Control::Pause) => paused = true,
                        Ok(Control::Resume) => {}
                        Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => return,
                        Err(RecvTimeoutError::Timeout) => {
                            on_tick();
                            deadline += interval;
                            let now = Instant::now();
                            if deadline < now {
                                // Fell behind; skip instead of bursting.
                                deadline = now + interval;
                            }
                        }
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                debug!("Clock started ({:?} interval)", self.interval);
                self.control = Some(tx);
                self.handle = Some(handle);
                if self.paused {
                    self.send(Control::Pause);
                }
            }
            Err(e) => error!("Failed to spawn clock thread: {}", e),
        }
    }

    fn pause(&mut self) {
        if self.stopped || self.paused {
            return;
        }
        self.paused = true;
        self.send(Control::Pause);
    }

    fn resume(&mut self) {
        if self.stopped || !self.paused {
            return;
        }
        self.paused = false;
        self.send(Control::Resume);
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.send(Control::Stop);
        self.control = None;

        if let Some(handle) = self.handle.take() {
            // Never join from inside a tick.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("Clock thread panicked");
            }
        }
        debug!("Clock stopped");
    }

    fn is_ticking(&self) -> bool {
        self.handle.is_some() && !self.paused && !self.stopped
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Creates [`IntervalClock`]s with a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct IntervalClockFactory {
    interval: Duration,
}

impl IntervalClockFactory {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for IntervalClockFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl ClockFactory for IntervalClockFactory {
    fn create(&self, on_tick: TickHandler) -> Box<dyn Clock> {
        Box::new(IntervalClock::new(self.interval, on_tick))
    }
}
