//! Test and helper mocks for feeder_core.
//!
//! `ScriptedPosition` replays a fixed trace (or a shared cell the test moves
//! by hand); `RecordingActuator` logs every command so tests can assert on
//! exactly what the controller asked for.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use feeder_traits::{MotorActuator, PositionSource};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// One command seen by [`RecordingActuator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Drive { speed: f32, brake: Option<bool> },
    Peel { speed: f32, brake: Option<bool> },
    Enable(bool),
}

#[derive(Debug, Default)]
struct RecorderState {
    log: Vec<Command>,
    enabled: bool,
    fail_drive: bool,
}

/// Actuator that records commands. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    inner: Rc<RefCell<RecorderState>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.inner.borrow().log.clone()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().log.clear();
    }

    pub fn drive_speeds(&self) -> Vec<f32> {
        self.inner
            .borrow()
            .log
            .iter()
            .filter_map(|c| match c {
                Command::Drive { speed, .. } => Some(*speed),
                _ => None,
            })
            .collect()
    }

    pub fn peel_speeds(&self) -> Vec<f32> {
        self.inner
            .borrow()
            .log
            .iter()
            .filter_map(|c| match c {
                Command::Peel { speed, .. } => Some(*speed),
                _ => None,
            })
            .collect()
    }

    pub fn last_drive(&self) -> Option<f32> {
        self.drive_speeds().last().copied()
    }

    /// Make every subsequent `drive_set` fail.
    pub fn fail_drive(&self, on: bool) {
        self.inner.borrow_mut().fail_drive = on;
    }
}

impl MotorActuator for RecordingActuator {
    fn drive_set(&mut self, speed: f32, brake: Option<bool>, _absolute_pwm: bool) -> Result<(), DynError> {
        let mut s = self.inner.borrow_mut();
        if s.fail_drive {
            return Err(Box::new(std::io::Error::other("drive bus fault")));
        }
        s.log.push(Command::Drive { speed, brake });
        Ok(())
    }

    fn peel_set(&mut self, speed: f32, brake: Option<bool>, _absolute_pwm: bool) -> Result<(), DynError> {
        self.inner.borrow_mut().log.push(Command::Peel { speed, brake });
        Ok(())
    }

    fn enable(&mut self, on: bool) -> Result<(), DynError> {
        let mut s = self.inner.borrow_mut();
        s.enabled = on;
        s.log.push(Command::Enable(on));
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.inner.borrow().enabled
    }
}

/// Position source backed by a shared cell the test writes directly.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPosition {
    current: Rc<Cell<i64>>,
    sampled: i64,
    last: i64,
    fail: Rc<Cell<bool>>,
    fail_after: Rc<Cell<Option<u32>>>,
}

impl ScriptedPosition {
    pub fn at(position: i64) -> Self {
        Self {
            current: Rc::new(Cell::new(position)),
            sampled: position,
            last: position,
            fail: Rc::new(Cell::new(false)),
            fail_after: Rc::new(Cell::new(None)),
        }
    }

    /// Move the underlying axis; seen on the next `refresh()`.
    pub fn set(&self, position: i64) {
        self.current.set(position);
    }

    pub fn get(&self) -> i64 {
        self.current.get()
    }

    /// Make `refresh()` fail until cleared.
    pub fn fail_reads(&self, on: bool) {
        self.fail.set(on);
    }

    /// Let `reads` more refreshes succeed, then fail every one after.
    pub fn fail_reads_after(&self, reads: u32) {
        self.fail_after.set(Some(reads));
    }
}

impl PositionSource for ScriptedPosition {
    fn refresh(&mut self) -> Result<(), DynError> {
        match self.fail_after.get() {
            Some(0) => self.fail.set(true),
            Some(n) => self.fail_after.set(Some(n - 1)),
            None => {}
        }
        if self.fail.get() {
            return Err(Box::new(std::io::Error::other("encoder read failed")));
        }
        self.last = self.sampled;
        self.sampled = self.current.get();
        Ok(())
    }

    fn position(&self) -> i64 {
        self.sampled
    }

    fn direction(&self) -> i8 {
        (self.sampled - self.last).signum() as i8
    }

    fn delta(&self) -> i64 {
        self.sampled - self.last
    }
}
