//! Time, period and unit helpers for feeder_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in microseconds for a given loop rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Compute the period in milliseconds for a given loop rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Loop period as a `Duration`, never shorter than 1 ms.
#[inline]
pub fn loop_period(interval_ms: u64) -> Duration {
    Duration::from_millis(interval_ms.max(1))
}

/// Convert a feed length in tenths of a millimetre to encoder ticks,
/// rounding to the nearest tick.
#[inline]
pub fn tenths_mm_to_ticks(tenths: i64, ticks_per_010mm: f64) -> i64 {
    (tenths as f64 * ticks_per_010mm).round() as i64
}

/// Wall-clock budget for a move: the nominal duration in the move's
/// direction scaled by `factor`, and never less than one loop period.
#[inline]
pub fn move_deadline(nominal_ms: u64, factor: f32, period: Duration) -> Duration {
    let scaled = (nominal_ms as f64 * f64::from(factor.max(0.0))).round() as u64;
    Duration::from_millis(scaled).max(period)
}
