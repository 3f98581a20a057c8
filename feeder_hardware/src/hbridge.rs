//! Dual H-bridge driving the main drive motor and the peel motor.
//!
//! Each motor is a pair of PWM half-bridges: forward drives channel 1 and
//! grounds channel 2, reverse the other way round. Both at 100 % is a brake,
//! both at 0 % lets the motor coast.

use feeder_traits::MotorActuator;

use crate::error::{HwError, Result};
use crate::util::{pwm_to_relative, relative_to_pwm};

/// One PWM output, duty in percent.
pub trait PwmChannel {
    fn set_duty_percent(&mut self, duty: f32) -> Result<()>;
    fn duty_percent(&self) -> f32;
}

/// The bridge enable line.
pub trait EnableLine {
    fn set_active(&mut self, level_high: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct HBridgeCfg {
    /// Lowest duty that still turns the drive motor without stalling.
    pub drive_pwm_min: f32,
    pub peel_pwm_min: f32,
    /// Brake instead of coast when a zero speed is commanded without an explicit choice.
    pub autobrake: bool,
    pub drive_invert: bool,
    pub peel_invert: bool,
    /// Enable line is active low.
    pub enable_invert: bool,
}

impl Default for HBridgeCfg {
    fn default() -> Self {
        Self {
            drive_pwm_min: 65.0,
            peel_pwm_min: 65.0,
            autobrake: true,
            drive_invert: false,
            peel_invert: false,
            enable_invert: false,
        }
    }
}

/// Decoded state of one bridge, read back from the channel duties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Forward,
    Reverse,
    Stop,
    Brake,
    Unknown,
}

impl BridgeStatus {
    fn from_duties(p1: f32, p2: f32) -> Self {
        if p1 >= 99.8 && p2 >= 99.8 {
            BridgeStatus::Brake
        } else if p1 > 0.0 && p2 == 0.0 {
            BridgeStatus::Forward
        } else if p1 == 0.0 && p2 > 0.0 {
            BridgeStatus::Reverse
        } else if p1 == 0.0 && p2 == 0.0 {
            BridgeStatus::Stop
        } else {
            BridgeStatus::Unknown
        }
    }
}

struct Bridge<P: PwmChannel> {
    fwd: P,
    rev: P,
    pwm_min: f32,
}

impl<P: PwmChannel> Bridge<P> {
    fn new(a: P, b: P, pwm_min: f32, invert: bool) -> Self {
        let (fwd, rev) = if invert { (b, a) } else { (a, b) };
        Self { fwd, rev, pwm_min }
    }

    fn set(&mut self, speed: f32, brake: bool, absolute_pwm: bool) -> Result<()> {
        if !(-100.0..=100.0).contains(&speed) || speed.is_nan() {
            return Err(HwError::SpeedOutOfRange(speed));
        }
        if speed == 0.0 {
            let duty = if brake { 100.0 } else { 0.0 };
            self.fwd.set_duty_percent(duty)?;
            return self.rev.set_duty_percent(duty);
        }
        let duty = if absolute_pwm {
            speed.abs().min(100.0)
        } else {
            relative_to_pwm(speed.abs(), self.pwm_min)
        };
        if speed > 0.0 {
            self.fwd.set_duty_percent(duty)?;
            self.rev.set_duty_percent(0.0)
        } else {
            self.fwd.set_duty_percent(0.0)?;
            self.rev.set_duty_percent(duty)
        }
    }

    fn all_off(&mut self) -> Result<()> {
        self.fwd.set_duty_percent(0.0)?;
        self.rev.set_duty_percent(0.0)
    }

    fn status(&self) -> BridgeStatus {
        BridgeStatus::from_duties(self.fwd.duty_percent(), self.rev.duty_percent())
    }

    fn relative_speed(&self) -> f32 {
        match self.status() {
            BridgeStatus::Forward => pwm_to_relative(self.fwd.duty_percent(), self.pwm_min),
            BridgeStatus::Reverse => -pwm_to_relative(self.rev.duty_percent(), self.pwm_min),
            _ => 0.0,
        }
    }
}

pub struct HBridge<P: PwmChannel, E: EnableLine> {
    drive: Bridge<P>,
    peel: Bridge<P>,
    enable_line: E,
    cfg: HBridgeCfg,
    enabled: bool,
}

impl<P: PwmChannel, E: EnableLine> HBridge<P, E> {
    /// Wire up the four half-bridges and leave the driver disabled with all
    /// outputs at 0 %.
    pub fn new(
        drive1: P,
        drive2: P,
        peel1: P,
        peel2: P,
        enable_line: E,
        cfg: HBridgeCfg,
    ) -> Result<Self> {
        for min in [cfg.drive_pwm_min, cfg.peel_pwm_min] {
            if !(0.0..=100.0).contains(&min) {
                return Err(HwError::PwmMinOutOfRange(min));
            }
        }
        let mut bridge = Self {
            drive: Bridge::new(drive1, drive2, cfg.drive_pwm_min, cfg.drive_invert),
            peel: Bridge::new(peel1, peel2, cfg.peel_pwm_min, cfg.peel_invert),
            enable_line,
            cfg,
            enabled: false,
        };
        bridge.drive.all_off()?;
        bridge.peel.all_off()?;
        bridge.set_enabled(false)?;
        tracing::info!(
            drive_pwm_min = cfg.drive_pwm_min,
            peel_pwm_min = cfg.peel_pwm_min,
            autobrake = cfg.autobrake,
            "h-bridge init, outputs disabled"
        );
        Ok(bridge)
    }

    fn set_enabled(&mut self, on: bool) -> Result<()> {
        let level = if self.cfg.enable_invert { !on } else { on };
        self.enable_line.set_active(level)?;
        self.enabled = on;
        tracing::debug!(enabled = on, "h-bridge enable");
        Ok(())
    }

    pub fn drive_status(&self) -> BridgeStatus {
        self.drive.status()
    }

    pub fn peel_status(&self) -> BridgeStatus {
        self.peel.status()
    }

    /// Relative drive speed reconstructed from the current duties.
    pub fn drive_speed(&self) -> f32 {
        self.drive.relative_speed()
    }

    pub fn peel_speed(&self) -> f32 {
        self.peel.relative_speed()
    }

    pub fn cfg(&self) -> &HBridgeCfg {
        &self.cfg
    }
}

impl<P: PwmChannel, E: EnableLine> MotorActuator for HBridge<P, E> {
    fn drive_set(
        &mut self,
        speed: f32,
        brake: Option<bool>,
        absolute_pwm: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.enabled {
            return Ok(());
        }
        let brake = brake.unwrap_or(self.cfg.autobrake);
        self.drive.set(speed, brake, absolute_pwm)?;
        Ok(())
    }

    fn peel_set(
        &mut self,
        speed: f32,
        brake: Option<bool>,
        absolute_pwm: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.enabled {
            return Ok(());
        }
        let brake = brake.unwrap_or(self.cfg.autobrake);
        self.peel.set(speed, brake, absolute_pwm)?;
        Ok(())
    }

    fn enable(&mut self, on: bool) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.set_enabled(on)?;
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}
