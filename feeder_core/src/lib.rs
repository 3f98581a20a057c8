#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core motion control for a single-axis tape feeder (hardware-agnostic).
//!
//! All hardware access goes through `feeder_traits::PositionSource` and
//! `feeder_traits::MotorActuator`; time comes from `feeder_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Configuration**: validated `MoveConfig` and `FeederTiming` (`config`)
//! - **Peel**: timed direction/speed state machine (`peel`)
//! - **Control**: phase machine with ramp, PID and backlash legs (`controller`)
//! - **Supervision**: paced loop with deadline and shutdown (`runner`)
//! - **Status**: phases and move outcomes (`status`)
//! - **Tuning**: repeated-move profiling and gain suggestions (`tuning`)
//!
//! Positions are `i64` encoder ticks; outputs are relative speeds in percent.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod peel;
pub mod pid;
pub mod profile;
pub mod runner;
pub mod status;
pub mod tuning;
pub mod util;

pub use builder::{Controller, ControllerBuilder, build_controller};
pub use config::{FeederTiming, MoveConfig, PidGains};
pub use controller::MotionController;
pub use error::{AbortReason, BuildError, FeederError, Result};
pub use peel::{PeelDirection, PeelSequencer};
pub use runner::{MoveReport, RunParams, feed_tenths_mm, move_to, run_to_target};
pub use status::{MoveOutcome, Phase};
pub use tuning::{MoveSample, MoveTypeSummary, run_profile, suggest_gains, summarize};
