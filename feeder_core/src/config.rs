//! Runtime configuration for the motion controller.
//!
//! These are plain structs consumed by `MotionController`; the TOML schema
//! lives in `feeder_config` and converts into them (see `conversions`).

use crate::error::BuildError;

/// PID gains. May be swapped between ticks with `MotionController::set_gains`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.05,
            ki: 0.0055,
            kd: 0.001,
        }
    }
}

impl PidGains {
    pub fn validate(&self) -> Result<(), BuildError> {
        for g in [self.kp, self.ki, self.kd] {
            if !g.is_finite() || g < 0.0 {
                return Err(BuildError::InvalidConfig("PID gains must be finite and >= 0"));
            }
        }
        Ok(())
    }
}

/// Everything a single-axis move needs to know.
///
/// Outputs are relative speeds in percent; distances are encoder ticks.
#[derive(Debug, Clone)]
pub struct MoveConfig {
    pub gains: PidGains,
    /// Ceiling on output magnitude.
    pub max_output: f32,
    /// Floor on output magnitude while the motor is being driven.
    pub min_output: f32,
    /// Distance from the setpoint counted as "there".
    pub tolerance: i64,
    /// Extra travel past the target on backward moves to take up gear lash.
    pub backlash_takeup: i64,
    /// Below this distance the PID takes over from the open-loop ramp.
    pub ramp_ticks: i64,
    /// Ramp end speed as a percentage of `max_output`.
    pub ramp_taper_percent: f32,
    /// Consecutive in-tolerance ticks needed to finish.
    pub stable_updates: u32,
    /// EMA weight of the newest derivative sample.
    pub derivative_alpha: f32,
    /// Brake (vs coast) when the drive is zeroed.
    pub brake_on_stop: bool,
    pub peel_enabled: bool,
    pub peel_speed: f32,
    pub peel_run_ms: u32,
    /// dt assumed when the clock reports no elapsed time.
    pub nominal_period_ms: u64,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            gains: PidGains::default(),
            max_output: 80.0,
            min_output: 5.0,
            tolerance: 15,
            backlash_takeup: 200,
            ramp_ticks: 250,
            ramp_taper_percent: 20.0,
            stable_updates: 3,
            derivative_alpha: 0.1,
            brake_on_stop: true,
            peel_enabled: true,
            peel_speed: 100.0,
            peel_run_ms: 1000,
            nominal_period_ms: 20,
        }
    }
}

impl MoveConfig {
    /// Reject values the controller cannot run with. Nothing is clamped.
    pub fn validate(&self) -> Result<(), BuildError> {
        self.gains.validate()?;
        if !(0.0..=100.0).contains(&self.max_output) || self.max_output == 0.0 {
            return Err(BuildError::InvalidConfig("max_output must be in (0, 100]"));
        }
        if !(0.0..=100.0).contains(&self.min_output) {
            return Err(BuildError::InvalidConfig("min_output must be in [0, 100]"));
        }
        if self.min_output > self.max_output {
            return Err(BuildError::InvalidConfig("min_output must be <= max_output"));
        }
        if self.tolerance < 0 || self.backlash_takeup < 0 || self.ramp_ticks < 0 {
            return Err(BuildError::InvalidConfig(
                "tolerance, backlash_takeup and ramp_ticks must be >= 0",
            ));
        }
        if !(0.0..=100.0).contains(&self.ramp_taper_percent) {
            return Err(BuildError::InvalidConfig("ramp_taper_percent must be in [0, 100]"));
        }
        if self.stable_updates == 0 {
            return Err(BuildError::InvalidConfig("stable_updates must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.derivative_alpha) {
            return Err(BuildError::InvalidConfig("derivative_alpha must be in [0, 1]"));
        }
        if !(0.0..=100.0).contains(&self.peel_speed) {
            return Err(BuildError::InvalidConfig("peel_speed must be in [0, 100]"));
        }
        if self.nominal_period_ms == 0 {
            return Err(BuildError::InvalidConfig("nominal_period_ms must be >= 1"));
        }
        Ok(())
    }

    /// Distance travelled past the target on a backward move.
    #[inline]
    pub fn overshoot_ticks(&self) -> i64 {
        self.ramp_ticks.saturating_add(self.backlash_takeup)
    }
}

/// Mechanical timing of the feeder, used to size supervision budgets and
/// to convert feed lengths.
#[derive(Debug, Clone)]
pub struct FeederTiming {
    /// Encoder ticks per 0.1 mm of tape.
    pub ticks_per_010mm: f64,
    pub loop_interval_ms: u64,
    /// Typical duration of a forward feed.
    pub forward_ms: u64,
    /// Typical duration of a backward (two-leg) move.
    pub backward_ms: u64,
    /// Multiplier applied to the typical duration to get the deadline.
    pub deadline_factor: f32,
}

impl Default for FeederTiming {
    fn default() -> Self {
        Self {
            ticks_per_010mm: 22.546,
            loop_interval_ms: 20,
            forward_ms: 1000,
            backward_ms: 1500,
            deadline_factor: 3.0,
        }
    }
}

impl FeederTiming {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.ticks_per_010mm.is_finite() || self.ticks_per_010mm <= 0.0 {
            return Err(BuildError::InvalidConfig("ticks_per_010mm must be > 0"));
        }
        if self.loop_interval_ms == 0 {
            return Err(BuildError::InvalidConfig("loop_interval_ms must be >= 1"));
        }
        if !self.deadline_factor.is_finite() || self.deadline_factor <= 0.0 {
            return Err(BuildError::InvalidConfig("deadline_factor must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(MoveConfig::default().validate().is_ok());
    }

    #[test]
    fn nan_outputs_are_rejected() {
        let cfg = MoveConfig {
            max_output: f32::NAN,
            ..MoveConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overshoot_is_ramp_plus_takeup() {
        assert_eq!(MoveConfig::default().overshoot_ticks(), 450);
    }
}
