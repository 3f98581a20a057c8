//! Hardware seams for the feeder motion engine.
//!
//! The core never touches registers: it reads position through
//! [`PositionSource`], commands the H-bridge through [`MotorActuator`], and
//! reads time through [`Clock`]. Platform adapters and simulators implement
//! these traits.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Quadrature position feed in an absolute, wrap-free tick frame.
pub trait PositionSource {
    /// Sample the hardware counter and update the absolute frame.
    /// Must be called once per control period before `position()` is read.
    fn refresh(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Cumulative absolute position in ticks.
    fn position(&self) -> i64;

    /// Sign of the last sample delta: -1, 0 or 1.
    fn direction(&self) -> i8;

    /// Ticks moved during the last refresh.
    fn delta(&self) -> i64 {
        0
    }

    /// Shaft speed estimate from the last refresh.
    fn rpm(&self) -> f32 {
        0.0
    }
}

/// Two-channel PWM H-bridge: the main drive and the peel motor.
///
/// Speeds are percentages in `-100.0..=100.0`; the sign selects direction.
/// `brake: None` uses the driver default for zero speed.
pub trait MotorActuator {
    fn drive_set(
        &mut self,
        speed: f32,
        brake: Option<bool>,
        absolute_pwm: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn peel_set(
        &mut self,
        speed: f32,
        brake: Option<bool>,
        absolute_pwm: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn enabled(&self) -> bool;
}

impl<T: PositionSource + ?Sized> PositionSource for Box<T> {
    fn refresh(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).refresh()
    }
    fn position(&self) -> i64 {
        (**self).position()
    }
    fn direction(&self) -> i8 {
        (**self).direction()
    }
    fn delta(&self) -> i64 {
        (**self).delta()
    }
    fn rpm(&self) -> f32 {
        (**self).rpm()
    }
}

impl<T: MotorActuator + ?Sized> MotorActuator for Box<T> {
    fn drive_set(
        &mut self,
        speed: f32,
        brake: Option<bool>,
        absolute_pwm: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).drive_set(speed, brake, absolute_pwm)
    }
    fn peel_set(
        &mut self,
        speed: f32,
        brake: Option<bool>,
        absolute_pwm: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).peel_set(speed, brake, absolute_pwm)
    }
    fn enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).enable(on)
    }
    fn enabled(&self) -> bool {
        (**self).enabled()
    }
}
