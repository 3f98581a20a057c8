//! Timed, directional state machine for the peel motor.
//!
//! The sequencer does not own the actuator: the controller lends it on each
//! call so both motors share one driver.

use std::time::{Duration, Instant};

use eyre::WrapErr;
use feeder_traits::MotorActuator;

use crate::error::Result;
use crate::hw_error::map_hw_error_dyn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeelDirection {
    #[default]
    Stopped,
    Forward,
    Reverse,
}

impl PeelDirection {
    /// `-1` reverse, `0` stop, `1` forward. Anything else is rejected.
    pub fn from_sign(sign: i8) -> Option<Self> {
        match sign {
            -1 => Some(PeelDirection::Reverse),
            0 => Some(PeelDirection::Stopped),
            1 => Some(PeelDirection::Forward),
            _ => None,
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            PeelDirection::Stopped => 0.0,
            PeelDirection::Forward => 1.0,
            PeelDirection::Reverse => -1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PeelDirection::Stopped => "STOPPED",
            PeelDirection::Forward => "FORWARD",
            PeelDirection::Reverse => "REVERSE",
        }
    }
}

impl core::fmt::Display for PeelDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeelSequencer {
    direction: PeelDirection,
    speed: f32,
    run_start: Option<Instant>,
    target_duration_ms: u32,
}

impl PeelSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the peel motor in `direction` for `duration_ms` at `speed` percent.
    ///
    /// Stopping (or a zero duration) always commands the motor off. Repeating
    /// the current direction and speed only restarts the timer.
    pub fn run<M: MotorActuator + ?Sized>(
        &mut self,
        motor: &mut M,
        now: Instant,
        direction: PeelDirection,
        duration_ms: u32,
        speed: f32,
    ) -> Result<()> {
        if direction == PeelDirection::Stopped || duration_ms == 0 {
            if self.direction != PeelDirection::Stopped {
                tracing::debug!(from = %self.direction, "peel immediate stop");
            }
            return self.halt(motor);
        }

        let speed = speed.abs().min(100.0);
        if self.direction != direction || self.speed != speed {
            motor
                .peel_set(direction.sign() * speed, None, false)
                .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
                .wrap_err("peel_set")?;
            tracing::debug!(%direction, speed, duration_ms, "peel start");
            self.direction = direction;
            self.speed = speed;
        } else {
            tracing::debug!(%direction, duration_ms, "peel timer reset");
        }
        self.run_start = Some(now);
        self.target_duration_ms = duration_ms;
        Ok(())
    }

    /// Expire a running peel. Call once per control period.
    pub fn tick<M: MotorActuator + ?Sized>(&mut self, motor: &mut M, now: Instant) -> Result<()> {
        if self.direction == PeelDirection::Stopped {
            return Ok(());
        }
        if self.expired(now) {
            tracing::debug!(direction = %self.direction, "peel run elapsed");
            self.halt(motor)?;
        }
        Ok(())
    }

    fn halt<M: MotorActuator + ?Sized>(&mut self, motor: &mut M) -> Result<()> {
        self.direction = PeelDirection::Stopped;
        self.speed = 0.0;
        self.run_start = None;
        self.target_duration_ms = 0;
        motor
            .peel_set(0.0, None, false)
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("peel stop")
    }

    pub fn is_idle(&self) -> bool {
        self.direction == PeelDirection::Stopped
    }

    pub fn direction(&self) -> PeelDirection {
        self.direction
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    fn remaining(&self, now: Instant) -> Duration {
        match self.run_start {
            Some(start) if self.direction != PeelDirection::Stopped => {
                let target = Duration::from_millis(u64::from(self.target_duration_ms));
                target.saturating_sub(now.saturating_duration_since(start))
            }
            _ => Duration::ZERO,
        }
    }

    /// The full run time has elapsed. Sub-millisecond remainders still count
    /// as running.
    fn expired(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Whole milliseconds left on the current run; 0 when stopped or expired.
    pub fn remaining_ms(&self, now: Instant) -> u64 {
        self.remaining(now).as_millis() as u64
    }
}
