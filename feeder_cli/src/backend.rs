//! Hardware assembly: config mapping and backend selection.
//!
//! Without the `hardware` feature (or without a `[pins]` table) every command
//! runs against the simulated plant.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::{Result, WrapErr};
use feeder_config::Config;
use feeder_core::{MoveConfig, build_controller};
use feeder_hardware::{EncoderCfg, HBridgeCfg, PlantCfg, SimBridge, SimEncoder, SimHandle};
use feeder_traits::{Clock, ManualClock, MonotonicClock};

use crate::cli::Commands;
use crate::motion;

pub fn bridge_cfg(c: &feeder_config::DrivesCfg) -> HBridgeCfg {
    HBridgeCfg {
        drive_pwm_min: c.drive_pwm_min,
        peel_pwm_min: c.peel_pwm_min,
        autobrake: c.autobrake,
        drive_invert: c.drive_invert,
        peel_invert: c.peel_invert,
        enable_invert: c.enable_invert,
    }
}

pub fn encoder_cfg(c: &feeder_config::EncoderCfg) -> EncoderCfg {
    EncoderCfg {
        max_count: c.max_count,
        ticks_per_revolution: c.ticks_per_revolution,
        invert: c.invert,
    }
}

pub fn plant_cfg(c: &feeder_config::SimCfg) -> PlantCfg {
    PlantCfg {
        max_ticks_per_s: c.max_ticks_per_s,
        stall_duty: c.stall_duty,
        drive_tau_s: c.drive_tau_ms / 1000.0,
        brake_tau_s: c.brake_tau_ms / 1000.0,
        coast_tau_s: c.coast_tau_ms / 1000.0,
        start_ticks: c.start_ticks,
    }
}

/// Wall clock when the simulation should run in real time, otherwise a
/// virtual clock the runner advances as it sleeps.
fn sim_clock(sim: &feeder_config::SimCfg) -> Arc<dyn Clock + Send + Sync> {
    if sim.realtime {
        Arc::new(MonotonicClock::new())
    } else {
        Arc::new(ManualClock::new())
    }
}

fn simulated(
    cfg: &Config,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<(SimEncoder, SimBridge, SimHandle)> {
    let (enc, bridge, sim) = feeder_hardware::simulated_feeder(
        plant_cfg(&cfg.sim),
        bridge_cfg(&cfg.drives),
        encoder_cfg(&cfg.encoder),
        clock,
    )
    .wrap_err("open simulated feeder")?;
    // Test hook: make every encoder read after construction fail
    if std::env::var("FEEDER_TEST_SIM_FAULT").is_ok_and(|v| v == "1") {
        sim.inject_read_fault(true);
    }
    Ok((enc, bridge, sim))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn gpio(
    cfg: &Config,
    pins: feeder_config::Pins,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<(feeder_hardware::gpio::GpioEncoder, feeder_hardware::gpio::GpioBridge)> {
    let gpio_pins = feeder_hardware::gpio::GpioPins {
        drive1: pins.drive1,
        drive2: pins.drive2,
        peel1: pins.peel1,
        peel2: pins.peel2,
        enable: pins.enable,
        encoder_a: pins.encoder_a,
        encoder_b: pins.encoder_b,
        pwm_freq_hz: f64::from(cfg.drives.pwm_frequency),
    };
    feeder_hardware::gpio::gpio_feeder(
        gpio_pins,
        bridge_cfg(&cfg.drives),
        encoder_cfg(&cfg.encoder),
        clock,
    )
    .wrap_err("open feeder pins")
}

/// Build the controller on the selected backend and run `cmd` on it.
pub fn dispatch(cfg: &Config, cmd: &Commands, json: bool, shutdown: Arc<AtomicBool>) -> Result<()> {
    let move_cfg = MoveConfig::from(cfg);

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    if let Some(pins) = cfg.pins {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let (enc, bridge) = gpio(cfg, pins, clock.clone())?;
        let mut ctl = build_controller(enc, bridge, move_cfg, Some(clock))?;
        return motion::execute(&mut ctl, cmd, cfg, "gpio", json, &shutdown);
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    if cfg.pins.is_some() {
        tracing::warn!("[pins] ignored: built without the hardware feature, using the simulator");
    }

    let clock = sim_clock(&cfg.sim);
    let (enc, bridge, _sim) = simulated(cfg, clock.clone())?;
    tracing::info!(realtime = cfg.sim.realtime, start = cfg.sim.start_ticks, "simulated feeder");
    let mut ctl = build_controller(enc, bridge, move_cfg, Some(clock))?;
    motion::execute(&mut ctl, cmd, cfg, "sim", json, &shutdown)
}
