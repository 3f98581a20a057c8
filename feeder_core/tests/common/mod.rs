//! Shared harness: a deterministic linear plant and a tick loop.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use feeder_core::mocks::Command;
use feeder_core::{MotionController, MoveConfig, Phase};
use feeder_traits::{ManualClock, MotorActuator, PositionSource};

type DynError = Box<dyn std::error::Error + Send + Sync>;

pub const PERIOD_MS: u64 = 20;

/// Axis that moves `gain` ticks per refresh for every percent of drive
/// commanded since the previous refresh. No inertia, no backlash.
#[derive(Debug)]
struct PlantState {
    position: f64,
    sampled: i64,
    previous: i64,
    drive: f32,
    gain: f64,
    enabled: bool,
    log: Vec<Command>,
}

#[derive(Clone)]
pub struct Plant(Rc<RefCell<PlantState>>);

pub struct PlantEncoder(Plant);
pub struct PlantMotor(Plant);

impl Plant {
    pub fn new(start: i64, gain: f64) -> Self {
        Plant(Rc::new(RefCell::new(PlantState {
            position: start as f64,
            sampled: start,
            previous: start,
            drive: 0.0,
            gain,
            enabled: false,
            log: Vec::new(),
        })))
    }

    pub fn encoder(&self) -> PlantEncoder {
        PlantEncoder(self.clone())
    }

    pub fn motor(&self) -> PlantMotor {
        PlantMotor(self.clone())
    }

    pub fn position(&self) -> i64 {
        self.0.borrow().position.round() as i64
    }

    pub fn set_position(&self, p: i64) {
        self.0.borrow_mut().position = p as f64;
    }

    pub fn set_gain(&self, gain: f64) {
        self.0.borrow_mut().gain = gain;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.0.borrow().log.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn drive_speeds(&self) -> Vec<f32> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Drive { speed, .. } => Some(speed),
                _ => None,
            })
            .collect()
    }

    pub fn peel_speeds(&self) -> Vec<f32> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Peel { speed, .. } => Some(speed),
                _ => None,
            })
            .collect()
    }
}

impl PositionSource for PlantEncoder {
    fn refresh(&mut self) -> Result<(), DynError> {
        let mut s = self.0.0.borrow_mut();
        if s.enabled {
            s.position += f64::from(s.drive) * s.gain;
        }
        s.previous = s.sampled;
        s.sampled = s.position.round() as i64;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.0.0.borrow().sampled
    }

    fn direction(&self) -> i8 {
        let s = self.0.0.borrow();
        (s.sampled - s.previous).signum() as i8
    }
}

impl MotorActuator for PlantMotor {
    fn drive_set(&mut self, speed: f32, brake: Option<bool>, _abs: bool) -> Result<(), DynError> {
        let mut s = self.0.0.borrow_mut();
        s.drive = speed;
        s.log.push(Command::Drive { speed, brake });
        Ok(())
    }

    fn peel_set(&mut self, speed: f32, brake: Option<bool>, _abs: bool) -> Result<(), DynError> {
        self.0.0.borrow_mut().log.push(Command::Peel { speed, brake });
        Ok(())
    }

    fn enable(&mut self, on: bool) -> Result<(), DynError> {
        let mut s = self.0.0.borrow_mut();
        s.enabled = on;
        if !on {
            s.drive = 0.0;
        }
        s.log.push(Command::Enable(on));
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.0.0.borrow().enabled
    }
}

pub type PlantController = MotionController<PlantEncoder, PlantMotor>;

pub struct Rig {
    pub ctl: PlantController,
    pub plant: Plant,
    pub clock: ManualClock,
}

/// Controller on a linear plant at `start`, 0.5 ticks per tick per percent.
pub fn rig(cfg: MoveConfig, start: i64) -> Rig {
    rig_with_gain(cfg, start, 0.5)
}

pub fn rig_with_gain(cfg: MoveConfig, start: i64, gain: f64) -> Rig {
    let plant = Plant::new(start, gain);
    let clock = ManualClock::new();
    let ctl = MotionController::new(plant.encoder(), plant.motor(), cfg, Arc::new(clock.clone()))
        .expect("controller");
    Rig { ctl, plant, clock }
}

#[derive(Debug, Clone, Copy)]
pub struct TickRecord {
    pub running: bool,
    pub phase: Phase,
    pub position: i64,
    pub output: f32,
    pub integral: f32,
}

/// Advance the clock one period and tick, recording the result.
pub fn step(r: &mut Rig) -> TickRecord {
    r.clock.advance_ms(PERIOD_MS);
    let running = r.ctl.tick().expect("tick");
    TickRecord {
        running,
        phase: r.ctl.phase(),
        position: r.ctl.position_source().position(),
        output: r.ctl.last_output(),
        integral: r.ctl.integral(),
    }
}

/// Tick until the controller reports idle, or panic after `max` ticks.
pub fn run_until_idle(r: &mut Rig, max: usize) -> Vec<TickRecord> {
    let mut out = Vec::new();
    for _ in 0..max {
        let rec = step(r);
        out.push(rec);
        if !rec.running {
            return out;
        }
    }
    panic!("move did not finish in {max} ticks: {:?}", out.last());
}

/// Config with peel coordination off, for tests that only look at the drive.
pub fn no_peel() -> MoveConfig {
    MoveConfig {
        peel_enabled: false,
        ..MoveConfig::default()
    }
}
