//! Simulated feeder: a first-order gearmotor plant behind a wrapping
//! counter and four PWM channels.
//!
//! The plant integrates lazily: every counter read or duty change first
//! advances the model to `clock.now()`, so the simulation runs equally well
//! on a real clock or on a [`feeder_traits::ManualClock`].

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use feeder_traits::Clock;

use crate::encoder::{EncoderCfg, QuadratureEncoder, RawCounter};
use crate::error::{HwError, Result};
use crate::hbridge::{EnableLine, HBridge, HBridgeCfg, PwmChannel};

const DRIVE1: usize = 0;
const DRIVE2: usize = 1;
const PEEL1: usize = 2;
const PEEL2: usize = 3;

// Integration sub-step
const SUBSTEP_NS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct PlantCfg {
    /// Shaft speed at 100 % duty, in encoder ticks per second.
    pub max_ticks_per_s: f64,
    /// Duty below which the gearmotor stalls.
    pub stall_duty: f64,
    /// Time constant of the driven speed response.
    pub drive_tau_s: f64,
    /// Time constant while shorted (brake).
    pub brake_tau_s: f64,
    /// Time constant while floating (coast or driver disabled).
    pub coast_tau_s: f64,
    /// Starting absolute position in ticks.
    pub start_ticks: i64,
}

impl Default for PlantCfg {
    fn default() -> Self {
        Self {
            max_ticks_per_s: 3000.0,
            stall_duty: 62.0,
            drive_tau_s: 0.03,
            brake_tau_s: 0.004,
            coast_tau_s: 0.08,
            start_ticks: 0,
        }
    }
}

struct PlantState {
    cfg: PlantCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    last: Instant,
    position: f64,
    velocity: f64,
    duties: [f32; 4],
    bridge_on: bool,
    fail_reads: bool,
    peel_active_ns: u64,
}

impl PlantState {
    fn advance(&mut self) {
        let now = self.clock.now();
        let mut remaining = now.saturating_duration_since(self.last).as_nanos() as u64;
        self.last = now;
        while remaining > 0 {
            let step_ns = remaining.min(SUBSTEP_NS);
            self.step(step_ns);
            remaining -= step_ns;
        }
    }

    fn step(&mut self, step_ns: u64) {
        let dt = step_ns as f64 * 1e-9;
        let (target, tau) = self.drive_target();
        let k = 1.0 - (-dt / tau.max(1e-6)).exp();
        self.velocity += (target - self.velocity) * k;
        self.position += self.velocity * dt;

        let (p1, p2) = (self.duties[PEEL1], self.duties[PEEL2]);
        if self.bridge_on && (p1 > 0.0) != (p2 > 0.0) {
            self.peel_active_ns += step_ns;
        }
    }

    fn drive_target(&self) -> (f64, f64) {
        if !self.bridge_on {
            return (0.0, self.cfg.coast_tau_s);
        }
        let (d1, d2) = (
            f64::from(self.duties[DRIVE1]),
            f64::from(self.duties[DRIVE2]),
        );
        if d1 >= 99.8 && d2 >= 99.8 {
            return (0.0, self.cfg.brake_tau_s);
        }
        let effective = d1 - d2;
        let mag = effective.abs();
        if mag <= self.cfg.stall_duty {
            // stalled or coasting
            let tau = if mag == 0.0 { self.cfg.coast_tau_s } else { self.cfg.drive_tau_s };
            return (0.0, tau);
        }
        let span = (100.0 - self.cfg.stall_duty).max(1e-6);
        let speed = (mag - self.cfg.stall_duty) / span * self.cfg.max_ticks_per_s;
        (speed.copysign(effective), self.cfg.drive_tau_s)
    }
}

type Shared = Rc<RefCell<PlantState>>;

/// Counter view of the plant, wrapping at `max_count` like a hardware timer.
pub struct SimCounter {
    plant: Shared,
    max_count: u32,
}

impl RawCounter for SimCounter {
    fn read(&mut self) -> Result<u32> {
        let mut p = self.plant.borrow_mut();
        if p.fail_reads {
            return Err(HwError::CounterRead("simulated counter fault".into()));
        }
        p.advance();
        let span = i64::from(self.max_count) + 1;
        Ok((p.position.round() as i64).rem_euclid(span) as u32)
    }

    fn write(&mut self, value: u32) -> Result<()> {
        let mut p = self.plant.borrow_mut();
        p.advance();
        p.position = f64::from(value);
        Ok(())
    }
}

/// One half-bridge output of the simulated driver.
pub struct SimPwm {
    plant: Shared,
    slot: usize,
}

impl PwmChannel for SimPwm {
    fn set_duty_percent(&mut self, duty: f32) -> Result<()> {
        let mut p = self.plant.borrow_mut();
        p.advance();
        p.duties[self.slot] = duty;
        Ok(())
    }

    fn duty_percent(&self) -> f32 {
        self.plant.borrow().duties[self.slot]
    }
}

pub struct SimEnable {
    plant: Shared,
    active_low: bool,
}

impl EnableLine for SimEnable {
    fn set_active(&mut self, level_high: bool) -> Result<()> {
        let mut p = self.plant.borrow_mut();
        p.advance();
        p.bridge_on = level_high != self.active_low;
        Ok(())
    }
}

/// Observation and fault-injection handle onto a running simulation.
#[derive(Clone)]
pub struct SimHandle {
    plant: Shared,
}

impl SimHandle {
    /// Continuous plant position in ticks.
    pub fn position(&self) -> f64 {
        let mut p = self.plant.borrow_mut();
        p.advance();
        p.position
    }

    pub fn velocity(&self) -> f64 {
        self.plant.borrow().velocity
    }

    pub fn drive_duties(&self) -> (f32, f32) {
        let p = self.plant.borrow();
        (p.duties[DRIVE1], p.duties[DRIVE2])
    }

    pub fn peel_duties(&self) -> (f32, f32) {
        let p = self.plant.borrow();
        (p.duties[PEEL1], p.duties[PEEL2])
    }

    /// Milliseconds the peel motor has been powered so far.
    pub fn peel_active_ms(&self) -> u64 {
        self.plant.borrow().peel_active_ns / 1_000_000
    }

    pub fn bridge_on(&self) -> bool {
        self.plant.borrow().bridge_on
    }

    /// Make subsequent counter reads fail.
    pub fn inject_read_fault(&self, on: bool) {
        self.plant.borrow_mut().fail_reads = on;
    }

    /// Shift the tape by an external disturbance.
    pub fn nudge(&self, ticks: f64) {
        let mut p = self.plant.borrow_mut();
        p.advance();
        p.position += ticks;
    }
}

pub type SimEncoder = QuadratureEncoder<SimCounter>;
pub type SimBridge = HBridge<SimPwm, SimEnable>;

/// Assemble an encoder and an H-bridge that share one simulated plant.
pub fn simulated_feeder(
    plant: PlantCfg,
    bridge: HBridgeCfg,
    encoder: EncoderCfg,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<(SimEncoder, SimBridge, SimHandle)> {
    let last = clock.now();
    let shared: Shared = Rc::new(RefCell::new(PlantState {
        cfg: plant,
        clock: clock.clone(),
        last,
        position: plant.start_ticks as f64,
        velocity: 0.0,
        duties: [0.0; 4],
        bridge_on: false,
        fail_reads: false,
        peel_active_ns: 0,
    }));
    let pwm = |slot| SimPwm {
        plant: shared.clone(),
        slot,
    };
    let hbridge = HBridge::new(
        pwm(DRIVE1),
        pwm(DRIVE2),
        pwm(PEEL1),
        pwm(PEEL2),
        SimEnable {
            plant: shared.clone(),
            active_low: bridge.enable_invert,
        },
        bridge,
    )?;
    let counter = SimCounter {
        plant: shared.clone(),
        max_count: encoder.max_count,
    };
    let mut enc = QuadratureEncoder::new(counter, encoder, clock)?;
    // Seed the absolute frame at the plant's start, not at the wrapped raw value.
    enc.rebase(plant.start_ticks);
    tracing::debug!(start_ticks = plant.start_ticks, "simulated feeder ready");
    Ok((enc, hbridge, SimHandle { plant: shared }))
}
