//! PWM mapping helpers shared by the H-bridge and its readback.

/// Map a relative speed magnitude (0..=100) onto the usable PWM window
/// `[pwm_min, 100]`. A floor at or above 100 % means "full or nothing".
#[inline]
pub fn relative_to_pwm(speed_abs: f32, pwm_min: f32) -> f32 {
    if pwm_min >= 100.0 {
        return if speed_abs > 0.0 { 100.0 } else { 0.0 };
    }
    let usable = 100.0 - pwm_min;
    let pwm = pwm_min + (speed_abs / 100.0) * usable;
    pwm.clamp(pwm_min, 100.0).trunc()
}

/// Inverse of [`relative_to_pwm`]: recover the relative speed from a duty.
/// Duties below the floor read back as 0.
#[inline]
pub fn pwm_to_relative(duty: f32, pwm_min: f32) -> f32 {
    if duty < pwm_min || pwm_min >= 100.0 {
        return 0.0;
    }
    let usable = 100.0 - pwm_min;
    (100.0 * (duty - pwm_min) / usable).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_into_window_above_floor() {
        assert_eq!(relative_to_pwm(0.0, 65.0), 65.0);
        assert_eq!(relative_to_pwm(100.0, 65.0), 100.0);
        assert_eq!(relative_to_pwm(50.0, 65.0), 82.0);
    }

    #[test]
    fn full_floor_is_bang_bang() {
        assert_eq!(relative_to_pwm(1.0, 100.0), 100.0);
        assert_eq!(relative_to_pwm(0.0, 100.0), 0.0);
    }

    #[test]
    fn readback_inverts_mapping() {
        assert_eq!(pwm_to_relative(100.0, 65.0), 100.0);
        assert_eq!(pwm_to_relative(65.0, 65.0), 0.0);
        assert_eq!(pwm_to_relative(40.0, 65.0), 0.0);
    }
}
