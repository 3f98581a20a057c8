#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the tape feeder.
//!
//! `Config` and its sections are deserialized from TOML and checked with
//! [`Config::validate`]. Every section is optional; missing keys take the
//! stock feeder defaults.
use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;

/// Position loop tuning and peel coordination.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServoCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Output ceiling, percent.
    pub max_output: f32,
    /// Output floor while driving, percent.
    pub min_output: f32,
    /// Ticks.
    pub tolerance: i64,
    /// Extra reverse travel to take up gear lash, ticks.
    pub takeup: i64,
    pub ramp_ticks: i64,
    /// Ramp end speed, percent of `max_output`.
    pub ramp_taper: f32,
    /// Consecutive in-tolerance updates before a move is done.
    pub updates: u32,
    pub derivative_alpha: f32,
    /// Brake rather than coast when stopping.
    pub brake: bool,
    pub peel_enable: bool,
    pub peel_speed: f32,
    pub peel_run_ms: u32,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            kp: 0.05,
            ki: 0.0055,
            kd: 0.001,
            max_output: 80.0,
            min_output: 5.0,
            tolerance: 15,
            takeup: 200,
            ramp_ticks: 250,
            ramp_taper: 20.0,
            updates: 3,
            derivative_alpha: 0.1,
            brake: true,
            peel_enable: true,
            peel_speed: 100.0,
            peel_run_ms: 1000,
        }
    }
}

/// H-bridge driver settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DrivesCfg {
    /// Lowest duty (percent) that turns the drive motor.
    pub drive_pwm_min: f32,
    pub peel_pwm_min: f32,
    pub autobrake: bool,
    pub drive_invert: bool,
    pub peel_invert: bool,
    /// Enable line is active low.
    pub enable_invert: bool,
    pub pwm_frequency: u32,
}

impl Default for DrivesCfg {
    fn default() -> Self {
        Self {
            drive_pwm_min: 65.0,
            peel_pwm_min: 65.0,
            autobrake: true,
            drive_invert: false,
            peel_invert: false,
            enable_invert: false,
            pwm_frequency: 25_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EncoderCfg {
    /// Highest raw counter value before wrap.
    pub max_count: u32,
    pub ticks_per_revolution: u32,
    pub invert: bool,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            max_count: 65_535,
            ticks_per_revolution: 28,
            invert: false,
        }
    }
}

/// Feeder mechanics and supervision timing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeederCfg {
    /// Encoder ticks per 0.1 mm of tape.
    pub ticks_010mm: f64,
    pub loop_interval_ms: u64,
    /// Typical forward feed time.
    pub forward_ms: u64,
    /// Typical backward (two-leg) move time.
    pub backward_ms: u64,
    /// Deadline = typical time * factor.
    pub deadline_factor: f32,
}

impl Default for FeederCfg {
    fn default() -> Self {
        Self {
            ticks_010mm: 22.546,
            loop_interval_ms: 20,
            forward_ms: 1000,
            backward_ms: 1500,
            deadline_factor: 3.0,
        }
    }
}

/// BCM pin numbers, only needed with the `hardware` feature.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub drive1: u8,
    pub drive2: u8,
    pub peel1: u8,
    pub peel2: u8,
    pub enable: u8,
    pub encoder_a: u8,
    pub encoder_b: u8,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Plant model used when running without hardware.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    pub max_ticks_per_s: f64,
    /// Duty (percent) below which the simulated motor stalls.
    pub stall_duty: f64,
    pub drive_tau_ms: f64,
    pub brake_tau_ms: f64,
    pub coast_tau_ms: f64,
    pub start_ticks: i64,
    /// Pace the loop on the wall clock. When false the simulation runs on a
    /// virtual clock and finishes as fast as the host allows.
    pub realtime: bool,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            max_ticks_per_s: 3000.0,
            stall_duty: 62.0,
            drive_tau_ms: 30.0,
            brake_tau_ms: 4.0,
            coast_tau_ms: 80.0,
            start_ticks: 0,
            realtime: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub servo: ServoCfg,
    pub drives: DrivesCfg,
    pub encoder: EncoderCfg,
    pub feeder: FeederCfg,
    pub pins: Option<Pins>,
    pub logging: Logging,
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_path(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

fn percent(v: f32) -> bool {
    (0.0..=100.0).contains(&v)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Servo
        let s = &self.servo;
        for (name, g) in [("kp", s.kp), ("ki", s.ki), ("kd", s.kd)] {
            if !g.is_finite() || g < 0.0 {
                eyre::bail!("servo.{name} must be finite and >= 0");
            }
        }
        if !percent(s.max_output) || s.max_output == 0.0 {
            eyre::bail!("servo.max_output must be in (0, 100]");
        }
        if !percent(s.min_output) {
            eyre::bail!("servo.min_output must be in [0, 100]");
        }
        if s.min_output > s.max_output {
            eyre::bail!("servo.min_output must be <= servo.max_output");
        }
        if s.tolerance < 0 {
            eyre::bail!("servo.tolerance must be >= 0");
        }
        if s.takeup < 0 {
            eyre::bail!("servo.takeup must be >= 0");
        }
        if s.ramp_ticks < 0 {
            eyre::bail!("servo.ramp_ticks must be >= 0");
        }
        if !percent(s.ramp_taper) {
            eyre::bail!("servo.ramp_taper must be in [0, 100]");
        }
        if s.updates == 0 {
            eyre::bail!("servo.updates must be >= 1");
        }
        if !(0.0..=1.0).contains(&s.derivative_alpha) {
            eyre::bail!("servo.derivative_alpha must be in [0, 1]");
        }
        if !percent(s.peel_speed) {
            eyre::bail!("servo.peel_speed must be in [0, 100]");
        }

        // Drives
        if !percent(self.drives.drive_pwm_min) {
            eyre::bail!("drives.drive_pwm_min must be in [0, 100]");
        }
        if !percent(self.drives.peel_pwm_min) {
            eyre::bail!("drives.peel_pwm_min must be in [0, 100]");
        }
        if self.drives.pwm_frequency == 0 {
            eyre::bail!("drives.pwm_frequency must be > 0");
        }

        // Encoder
        if self.encoder.max_count < 2 {
            eyre::bail!("encoder.max_count must be >= 2");
        }
        if self.encoder.ticks_per_revolution == 0 {
            eyre::bail!("encoder.ticks_per_revolution must be >= 1");
        }

        // Feeder
        let f = &self.feeder;
        if !f.ticks_010mm.is_finite() || f.ticks_010mm <= 0.0 {
            eyre::bail!("feeder.ticks_010mm must be > 0");
        }
        if f.loop_interval_ms == 0 {
            eyre::bail!("feeder.loop_interval_ms must be >= 1");
        }
        if f.loop_interval_ms > 1000 {
            eyre::bail!("feeder.loop_interval_ms is unreasonably large (>1s)");
        }
        if f.forward_ms == 0 || f.backward_ms == 0 {
            eyre::bail!("feeder.forward_ms and feeder.backward_ms must be >= 1");
        }
        if !f.deadline_factor.is_finite() || f.deadline_factor <= 0.0 {
            eyre::bail!("feeder.deadline_factor must be > 0");
        }

        // Sim
        let sim = &self.sim;
        if !sim.max_ticks_per_s.is_finite() || sim.max_ticks_per_s <= 0.0 {
            eyre::bail!("sim.max_ticks_per_s must be > 0");
        }
        if !(0.0..100.0).contains(&sim.stall_duty) {
            eyre::bail!("sim.stall_duty must be in [0, 100)");
        }
        for (name, tau) in [
            ("drive_tau_ms", sim.drive_tau_ms),
            ("brake_tau_ms", sim.brake_tau_ms),
            ("coast_tau_ms", sim.coast_tau_ms),
        ] {
            if !tau.is_finite() || tau <= 0.0 {
                eyre::bail!("sim.{name} must be > 0");
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
