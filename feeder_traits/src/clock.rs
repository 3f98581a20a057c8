//! Time source for the control loop.
//!
//! The controller stamps PID updates and peel runs with `now()`; only the
//! runner sleeps. Swapping in [`ManualClock`] makes a whole move replayable.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;

    /// Block for `d`. Virtual clocks advance instead.
    fn sleep(&self, d: Duration);

    /// Sleep until `at`; returns at once if it has already passed.
    fn sleep_until(&self, at: Instant) {
        let now = self.now();
        if at > now {
            self.sleep(at - now);
        }
    }

    /// Whole milliseconds since `epoch`, 0 if `epoch` lies ahead.
    fn ms_since(&self, epoch: Instant) -> u64 {
        self.now().saturating_duration_since(epoch).as_millis() as u64
    }
}

/// Wall clock used on real hardware and by `sim.realtime` runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now() = origin + offset
/// sleep(d) advances internal time by d without actually sleeping.
///
/// Clones share the same timeline, so a test can hand one copy to the
/// controller and keep another to step the simulation.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Advance the clock by whole milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Set the absolute offset relative to origin.
    pub fn set_offset(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = d;
        }
    }

    /// Current offset from the origin.
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.ms_since(t0), 0);
        clock.advance_ms(20);
        assert_eq!(clock.ms_since(t0), 20);
        clock.sleep(Duration::from_millis(5));
        assert_eq!(clock.ms_since(t0), 25);
    }

    #[test]
    fn sleep_until_past_instant_is_a_no_op() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance_ms(30);
        clock.sleep_until(t0 + Duration::from_millis(10));
        assert_eq!(clock.ms_since(t0), 30);
        clock.sleep_until(t0 + Duration::from_millis(50));
        assert_eq!(clock.ms_since(t0), 50);
    }

    #[test]
    fn clones_share_a_timeline() {
        let a = ManualClock::new();
        let b = a.clone();
        let t0 = a.now();
        b.advance_ms(100);
        assert_eq!(a.ms_since(t0), 100);
    }

    #[test]
    fn ms_since_saturates_for_future_epoch() {
        let clock = ManualClock::new();
        clock.set_offset(Duration::from_millis(50));
        let later = clock.now() + Duration::from_millis(10);
        assert_eq!(clock.ms_since(later), 0);
    }
}
