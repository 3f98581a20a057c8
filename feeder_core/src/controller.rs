//! Single-axis position controller: open-loop ramp, PID approach and
//! two-leg backlash compensation, coordinated with the peel motor.
//!
//! Every backward move is split in two. The reverse leg runs past the target
//! by `ramp_ticks + backlash_takeup`, then the forward leg approaches the real
//! target from below so the gear train always ends loaded in the same
//! direction. The peel motor runs alongside each leg and a leg never starts
//! while a previous peel run is still going.
//!
//! `tick()` is meant to be called once per control period. It never sleeps.

use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use feeder_traits::{Clock, MotorActuator, PositionSource};

use crate::config::{MoveConfig, PidGains};
use crate::error::{FeederError, Result};
use crate::hw_error::map_hw_error_dyn;
use crate::peel::{PeelDirection, PeelSequencer};
use crate::pid::PidState;
use crate::profile::{ramp_output, reverse_output, shape_pid};
use crate::status::{MoveOutcome, Phase};

fn hw<T>(
    r: std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>,
    what: &'static str,
) -> Result<T> {
    r.map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
        .wrap_err(what)
}

pub struct MotionController<P: PositionSource, M: MotorActuator> {
    position: P,
    motor: M,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: MoveConfig,
    peel: PeelSequencer,
    pid: PidState,
    phase: Phase,
    outcome: Option<MoveOutcome>,
    setpoint: i64,
    original_setpoint: i64,
    initial_position: i64,
    initial_error_abs: i64,
    last_update: Instant,
    stable_count: u32,
    last_output: f32,
}

impl<P: PositionSource, M: MotorActuator> core::fmt::Debug for MotionController<P, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("phase", &self.phase)
            .field("setpoint", &self.setpoint)
            .field("original_setpoint", &self.original_setpoint)
            .field("position", &self.position.position())
            .field("last_output", &self.last_output)
            .field("peel", &self.peel.direction())
            .finish()
    }
}

impl<P: PositionSource, M: MotorActuator> MotionController<P, M> {
    /// Validate `cfg` and take ownership of the hardware. The controller
    /// starts idle and does not touch the actuator until the first move.
    pub fn new(
        position: P,
        motor: M,
        cfg: MoveConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        let now = clock.now();
        tracing::info!(
            kp = cfg.gains.kp,
            ki = cfg.gains.ki,
            kd = cfg.gains.kd,
            max_output = cfg.max_output,
            min_output = cfg.min_output,
            tolerance = cfg.tolerance,
            ramp_ticks = cfg.ramp_ticks,
            backlash_takeup = cfg.backlash_takeup,
            peel = cfg.peel_enabled,
            "motion controller init"
        );
        Ok(Self {
            position,
            motor,
            clock,
            cfg,
            peel: PeelSequencer::new(),
            pid: PidState::default(),
            phase: Phase::Idle,
            outcome: None,
            setpoint: 0,
            original_setpoint: 0,
            initial_position: 0,
            initial_error_abs: 0,
            last_update: now,
            stable_count: 0,
            last_output: 0.0,
        })
    }

    // ── Hardware helpers ────────────────────────────────────────────────────

    fn refresh(&mut self) -> Result<i64> {
        hw(self.position.refresh(), "position refresh")?;
        Ok(self.position.position())
    }

    fn zero_drive(&mut self) -> Result<()> {
        self.last_output = 0.0;
        hw(
            self.motor
                .drive_set(0.0, Some(self.cfg.brake_on_stop), false),
            "drive stop",
        )
    }

    fn peel_command(&mut self, direction: PeelDirection) -> Result<()> {
        if !self.cfg.peel_enabled {
            return Ok(());
        }
        let now = self.clock.now();
        self.peel.run(
            &mut self.motor,
            now,
            direction,
            self.cfg.peel_run_ms,
            self.cfg.peel_speed,
        )
    }

    fn peel_busy(&self) -> bool {
        self.cfg.peel_enabled && !self.peel.is_idle()
    }

    // ── Move setup ──────────────────────────────────────────────────────────

    fn reset_leg(&mut self, position: i64, now: Instant) {
        let error = self.setpoint.saturating_sub(position);
        self.pid.reset(error as f32);
        self.initial_position = position;
        self.initial_error_abs = error.saturating_abs();
        self.last_update = now;
        self.stable_count = 0;
    }

    fn finish(&mut self, outcome: MoveOutcome) {
        self.phase = Phase::Idle;
        self.outcome = Some(outcome);
    }

    /// Start a move to `target`. Enables the driver if needed.
    ///
    /// A target below the current position becomes a two-leg move; anything
    /// else is approached directly. A forward target already within tolerance
    /// completes here without any motion.
    pub fn set_target(&mut self, target: i64) -> Result<()> {
        self.enable(true)?;
        let current = self.refresh()?;
        let now = self.clock.now();

        let setpoint = if target < current {
            target.checked_sub(self.cfg.overshoot_ticks())
        } else {
            Some(target)
        };
        let Some(setpoint) = setpoint.filter(|sp| sp.checked_sub(current).is_some()) else {
            tracing::warn!(target, current, "target outside the position range");
            return Err(FeederError::Config(format!(
                "target {target} out of range from position {current}"
            ))
            .into());
        };

        self.original_setpoint = target;
        self.outcome = None;
        self.setpoint = setpoint;

        if target < current {
            if self.peel_busy() {
                self.phase = Phase::WaitPeelBeforeReverseLeg;
                tracing::info!(
                    target,
                    overshoot = self.setpoint,
                    "backward move queued behind peel run"
                );
            } else {
                self.phase = Phase::ReverseLeg;
                self.peel_command(PeelDirection::Reverse)?;
                tracing::info!(target, overshoot = self.setpoint, current, "reverse leg start");
            }
        } else {
            self.phase = Phase::ForwardLeg;
            if target != current {
                self.peel_command(PeelDirection::Forward)?;
                tracing::info!(target, current, "forward move start");
            } else {
                self.peel_command(PeelDirection::Stopped)?;
            }
        }

        self.reset_leg(current, now);

        if self.phase == Phase::ForwardLeg && self.initial_error_abs <= self.cfg.tolerance {
            tracing::info!(target, current, "target within tolerance");
            self.zero_drive()?;
            self.finish(MoveOutcome::AlreadyAtTarget);
        }
        Ok(())
    }

    /// Swap the reverse-leg setpoint for the real target and start the
    /// approach. Returns `true` when the target is already within tolerance.
    fn begin_forward_leg(&mut self, position: i64, now: Instant) -> Result<bool> {
        self.setpoint = self.original_setpoint;
        self.phase = Phase::ForwardLeg;
        self.reset_leg(position, now);
        self.peel_command(PeelDirection::Forward)?;

        if self.initial_error_abs <= self.cfg.tolerance {
            tracing::info!(target = self.setpoint, position, "forward leg: already at target");
            self.zero_drive()?;
            self.finish(MoveOutcome::AlreadyAtTarget);
            return Ok(true);
        }
        tracing::info!(target = self.setpoint, position, "forward leg start");
        Ok(false)
    }

    // ── Control loop ────────────────────────────────────────────────────────

    /// Advance the move by one control period.
    ///
    /// Returns `Ok(true)` while the move is in progress and `Ok(false)` once
    /// the controller is idle or disabled. Position read and actuator errors
    /// are returned unchanged; the caller decides whether to `stop()`.
    pub fn tick(&mut self) -> Result<bool> {
        if self.cfg.peel_enabled {
            let now = self.clock.now();
            self.peel.tick(&mut self.motor, now)?;
        }

        if !self.motor.enabled() {
            if self.peel_busy() {
                self.peel_command(PeelDirection::Stopped)?;
            }
            return Ok(false);
        }

        if self.phase == Phase::Idle {
            return Ok(false);
        }

        let position = self.refresh()?;
        let now = self.clock.now();

        match self.phase {
            Phase::WaitPeelBeforeReverseLeg => {
                if self.peel_busy() {
                    return Ok(true);
                }
                tracing::info!(overshoot = self.setpoint, position, "peel idle, reverse leg start");
                self.phase = Phase::ReverseLeg;
                self.peel_command(PeelDirection::Reverse)?;
            }
            Phase::WaitPeelBeforeForwardLeg => {
                if self.peel_busy() {
                    return Ok(true);
                }
                if self.begin_forward_leg(position, now)? {
                    return Ok(false);
                }
            }
            _ => {}
        }

        if self.phase == Phase::ReverseLeg {
            if position > self.setpoint {
                let error = self.setpoint.saturating_sub(position);
                let output = reverse_output(error.saturating_abs(), self.initial_error_abs, &self.cfg);
                return self.commit(error, output, now);
            }
            tracing::info!(position, overshoot = self.setpoint, "reverse leg complete");
            self.zero_drive()?;
            self.phase = Phase::WaitPeelBeforeForwardLeg;
            if self.peel_busy() {
                return Ok(true);
            }
            if self.begin_forward_leg(position, now)? {
                return Ok(false);
            }
        }

        self.forward_step(position, now)
    }

    fn forward_step(&mut self, position: i64, now: Instant) -> Result<bool> {
        let error = self.setpoint.saturating_sub(position);
        let distance = error.saturating_abs();

        if position > self.setpoint && distance > self.cfg.tolerance {
            tracing::warn!(position, target = self.setpoint, "overshoot, move abandoned");
            self.zero_drive()?;
            self.finish(MoveOutcome::Overshoot);
            return Ok(false);
        }

        if distance <= self.cfg.tolerance {
            self.stable_count += 1;
            self.zero_drive()?;
            if self.stable_count >= self.cfg.stable_updates {
                tracing::info!(position, target = self.setpoint, "target reached");
                self.finish(MoveOutcome::Settled);
                return Ok(false);
            }
            self.pid.remember(error as f32);
            self.last_update = now;
            return Ok(true);
        }
        self.stable_count = 0;

        let output = if distance > self.cfg.ramp_ticks {
            ramp_output(distance, self.initial_error_abs, &self.cfg)
        } else {
            let elapsed = now.saturating_duration_since(self.last_update);
            let dt = (!elapsed.is_zero()).then(|| elapsed.as_secs_f32());
            let nominal = self.cfg.nominal_period_ms as f32 / 1000.0;
            let raw = self.pid.step(
                &self.cfg.gains,
                error as f32,
                dt,
                nominal,
                self.cfg.derivative_alpha,
                self.cfg.max_output,
            );
            shape_pid(raw, error, &self.cfg)
        };
        self.commit(error, output, now)
    }

    fn commit(&mut self, error: i64, output: f32, now: Instant) -> Result<bool> {
        self.pid.remember(error as f32);
        self.last_update = now;
        let output = output.clamp(-self.cfg.max_output, self.cfg.max_output);
        tracing::trace!(
            phase = %self.phase,
            position = self.setpoint.saturating_sub(error),
            error,
            output,
            "tick"
        );
        hw(self.motor.drive_set(output, None, false), "drive_set")?;
        self.last_output = output;
        Ok(true)
    }

    // ── Abort and enable ────────────────────────────────────────────────────

    /// Zero the drive, stop the peel motor and drop to idle. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        self.zero_drive()?;
        if self.cfg.peel_enabled {
            self.peel_command(PeelDirection::Stopped)?;
        }
        if self.phase != Phase::Idle {
            tracing::info!(phase = %self.phase, "move stopped");
            self.finish(MoveOutcome::Stopped);
        }
        Ok(())
    }

    /// Power the driver on, or stop everything and power it off.
    pub fn enable(&mut self, on: bool) -> Result<()> {
        if on {
            if !self.motor.enabled() {
                hw(self.motor.enable(true), "driver enable")?;
                tracing::info!("driver enabled");
            }
            return Ok(());
        }
        self.stop()?;
        hw(self.motor.enable(false), "driver disable")?;
        tracing::info!("driver disabled");
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.motor.enabled()
    }

    // ── Peel pass-through ───────────────────────────────────────────────────

    /// Allow or forbid the controller to run the peel motor. Forbidding it
    /// also stops any run in progress.
    pub fn peel_enable(&mut self, on: bool) -> Result<()> {
        tracing::info!(peel = on, "peel coordination");
        self.cfg.peel_enabled = on;
        if !on {
            let now = self.clock.now();
            self.peel
                .run(&mut self.motor, now, PeelDirection::Stopped, 0, 0.0)?;
        }
        Ok(())
    }

    /// Run the peel motor by hand. Ignored while peel coordination is off.
    pub fn peel_run(&mut self, direction: PeelDirection, duration_ms: u32, speed: f32) -> Result<()> {
        if !self.cfg.peel_enabled {
            tracing::warn!(%direction, "peel disabled, manual run ignored");
            return Ok(());
        }
        let now = self.clock.now();
        self.peel.run(&mut self.motor, now, direction, duration_ms, speed)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    /// True when no move is in progress.
    pub fn is_target_reached(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Sample the encoder and return the absolute position.
    pub fn current_position(&mut self) -> Result<i64> {
        self.refresh()
    }

    pub fn set_gains(&mut self, gains: PidGains) -> Result<()> {
        gains.validate().map_err(eyre::Report::new)?;
        self.cfg.gains = gains;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<MoveOutcome> {
        self.outcome
    }

    pub fn setpoint(&self) -> i64 {
        self.setpoint
    }

    pub fn original_setpoint(&self) -> i64 {
        self.original_setpoint
    }

    pub fn initial_position(&self) -> i64 {
        self.initial_position
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub fn integral(&self) -> f32 {
        self.pid.integral()
    }

    pub fn config(&self) -> &MoveConfig {
        &self.cfg
    }

    pub fn peel(&self) -> &PeelSequencer {
        &self.peel
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn position_source(&self) -> &P {
        &self.position
    }

    pub fn actuator(&self) -> &M {
        &self.motor
    }

    /// Give the hardware back.
    pub fn into_parts(self) -> (P, M) {
        (self.position, self.motor)
    }
}
