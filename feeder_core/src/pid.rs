//! PID working set with integral anti-windup and an EMA-smoothed derivative.

use crate::config::PidGains;

#[derive(Debug, Clone, Default)]
pub struct PidState {
    integral: f32,
    previous_error: f32,
    filtered_derivative: f32,
}

/// Largest integral magnitude the gains allow: `max_output / ki`, or
/// `max_output` itself when the integral term is switched off.
#[inline]
pub fn integral_limit(gains: &PidGains, max_output: f32) -> f32 {
    if gains.ki != 0.0 {
        (max_output / gains.ki).abs()
    } else {
        max_output
    }
}

impl PidState {
    /// Start a new leg: clear the integral and derivative, seed the error.
    pub fn reset(&mut self, error: f32) {
        self.integral = 0.0;
        self.previous_error = error;
        self.filtered_derivative = 0.0;
    }

    /// Record this tick's error for the next derivative sample.
    pub fn remember(&mut self, error: f32) {
        self.previous_error = error;
    }

    /// Raw `P + I + D` for `error`.
    ///
    /// `dt_s` is the measured time since the last update. When it is `None`
    /// (clock did not advance) the integral uses `nominal_dt_s` and the
    /// derivative is left untouched.
    pub fn step(
        &mut self,
        gains: &PidGains,
        error: f32,
        dt_s: Option<f32>,
        nominal_dt_s: f32,
        alpha: f32,
        max_output: f32,
    ) -> f32 {
        let p = gains.kp * error;

        let dt_i = dt_s.unwrap_or(nominal_dt_s);
        let limit = integral_limit(gains, max_output);
        self.integral = (self.integral + error * dt_i).clamp(-limit, limit);
        let i = gains.ki * self.integral;

        let d = match dt_s {
            Some(dt) if dt > 0.0 => {
                let raw = (error - self.previous_error) / dt;
                self.filtered_derivative = alpha * raw + (1.0 - alpha) * self.filtered_derivative;
                gains.kd * self.filtered_derivative
            }
            _ => 0.0,
        };

        tracing::trace!(p, i, d, integral = self.integral, "pid terms");
        p + i + d
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn previous_error(&self) -> f32 {
        self.previous_error
    }

    pub fn filtered_derivative(&self) -> f32 {
        self.filtered_derivative
    }
}
