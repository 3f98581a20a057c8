//! Open-loop speed profiles for the ramp and the reverse leg, and the
//! shaping applied to PID output. Pure functions of distance and config.

use crate::config::MoveConfig;

/// Fraction of `max_output` the reverse leg starts at.
pub const REVERSE_SPEED_FRACTION: f32 = 0.6;

/// Lowest speed the ramp tapers down to before the PID takes over.
#[inline]
pub fn ramp_floor(cfg: &MoveConfig) -> f32 {
    let tapered = cfg.ramp_taper_percent / 100.0 * cfg.max_output;
    tapered.max(cfg.min_output).min(cfg.max_output)
}

/// Ramp speed at `distance`, linear from `max_output` at the start of the
/// leg down to [`ramp_floor`] at `ramp_ticks`.
pub fn ramp_output(distance: i64, initial_error_abs: i64, cfg: &MoveConfig) -> f32 {
    let floor = ramp_floor(cfg);
    let span = initial_error_abs - cfg.ramp_ticks;
    let out = if span > 0 {
        let progress = ((distance - cfg.ramp_ticks) as f32 / span as f32).clamp(0.0, 1.0);
        floor + (cfg.max_output - floor) * progress
    } else {
        floor
    };
    out.min(cfg.max_output)
}

/// Reverse-leg speed (negative). Starts near `0.6 * max_output` and slows
/// to `min_output` as the overshoot point approaches.
pub fn reverse_output(distance: i64, initial_error_abs: i64, cfg: &MoveConfig) -> f32 {
    let top = cfg.max_output * REVERSE_SPEED_FRACTION;
    let remaining = if initial_error_abs > 0 {
        (distance as f32 / initial_error_abs as f32).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let out = -(cfg.min_output + (top - cfg.min_output) * remaining);
    out.clamp(-cfg.max_output, -cfg.min_output)
}

/// Clamp a raw PID sum to `[min_output, max_output]` in the sign of `error`.
pub fn shape_pid(raw: f32, error: i64, cfg: &MoveConfig) -> f32 {
    let sign = if error < 0 { -1.0 } else { 1.0 };
    let mag = (raw * sign).clamp(cfg.min_output, cfg.max_output);
    mag * sign
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MoveConfig {
        MoveConfig::default()
    }

    #[test]
    fn ramp_starts_at_max_and_ends_at_floor() {
        let c = cfg();
        assert_eq!(ramp_output(1000, 1000, &c), 80.0);
        assert_eq!(ramp_output(250, 1000, &c), 16.0);
        let mid = ramp_output(625, 1000, &c);
        assert!((mid - 48.0).abs() < 1e-4, "{mid}");
    }

    #[test]
    fn ramp_floor_respects_min_output() {
        let c = MoveConfig {
            ramp_taper_percent: 0.0,
            min_output: 7.0,
            ..cfg()
        };
        assert_eq!(ramp_floor(&c), 7.0);
    }

    #[test]
    fn ramp_with_no_span_runs_at_floor() {
        let c = cfg();
        assert_eq!(ramp_output(260, 240, &c), 16.0);
    }

    #[test]
    fn reverse_is_negative_and_bounded() {
        let c = cfg();
        assert_eq!(reverse_output(850, 850, &c), -48.0);
        assert_eq!(reverse_output(0, 850, &c), -5.0);
        assert_eq!(reverse_output(5, 0, &c), -5.0);
        for d in (0..2000).step_by(37) {
            let out = reverse_output(d, 850, &c);
            assert!((-c.max_output..=-c.min_output).contains(&out));
        }
    }

    #[test]
    fn pid_shaping_keeps_error_sign() {
        let c = cfg();
        assert_eq!(shape_pid(200.0, 100, &c), 80.0);
        assert_eq!(shape_pid(0.1, 100, &c), 5.0);
        assert_eq!(shape_pid(-3.0, 100, &c), 5.0);
        assert_eq!(shape_pid(-12.0, -100, &c), -12.0);
    }
}
