//! Supervising loop around `MotionController::tick`.
//!
//! The controller has no notion of time budgets. The runner paces ticks on
//! the controller's clock, enforces a wall-clock deadline, watches a shutdown
//! flag, and always leaves the drive stopped when it gives up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use feeder_traits::{MotorActuator, PositionSource};

use crate::config::FeederTiming;
use crate::controller::MotionController;
use crate::error::{AbortReason, FeederError, Result};
use crate::status::MoveOutcome;
use crate::util::{loop_period, move_deadline, tenths_mm_to_ticks};

#[derive(Debug, Clone)]
pub struct RunParams {
    /// Tick period.
    pub period: Duration,
    /// Give up (and stop) after this long. `None` runs until the move ends.
    pub deadline: Option<Duration>,
    /// Raised by a signal handler to abort the move.
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            period: loop_period(20),
            deadline: None,
            shutdown: None,
        }
    }
}

impl RunParams {
    /// Period and deadline for a move in the given direction.
    pub fn from_timing(timing: &FeederTiming, backward: bool) -> Self {
        let period = loop_period(timing.loop_interval_ms);
        let nominal = if backward {
            timing.backward_ms
        } else {
            timing.forward_ms
        };
        Self {
            period,
            deadline: Some(move_deadline(nominal, timing.deadline_factor, period)),
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

/// Summary of one supervised move.
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub target: i64,
    pub start_position: i64,
    pub final_position: i64,
    pub outcome: Option<MoveOutcome>,
    pub ticks: u64,
    pub elapsed: Duration,
    /// Longest time a single `tick()` took.
    pub worst_tick: Duration,
    /// Periods where the loop fell behind schedule.
    pub missed_periods: u64,
}

impl MoveReport {
    /// Signed distance from the target at the end of the move.
    pub fn error(&self) -> i64 {
        self.target - self.final_position
    }
}

fn abort<P, M>(ctl: &mut MotionController<P, M>, reason: AbortReason) -> eyre::Report
where
    P: PositionSource,
    M: MotorActuator,
{
    if let Err(e) = ctl.stop() {
        tracing::error!(error = %e, "stop after abort failed");
    }
    tracing::warn!(%reason, position = ctl.position_source().position(), "move aborted");
    eyre::Report::new(FeederError::Abort(reason))
}

/// Drive `ctl` to `target`, ticking every `params.period`.
pub fn run_to_target<P, M>(
    ctl: &mut MotionController<P, M>,
    target: i64,
    params: &RunParams,
) -> Result<MoveReport>
where
    P: PositionSource,
    M: MotorActuator,
{
    let clock = ctl.clock().clone();
    let start = clock.now();

    ctl.set_target(target).wrap_err("set_target")?;
    let start_position = ctl.initial_position();
    tracing::info!(target, start_position, phase = %ctl.phase(), "move start");

    let mut ticks: u64 = 0;
    let mut worst_tick = Duration::ZERO;
    let mut missed_periods: u64 = 0;
    let mut next = start;

    loop {
        if params.shutdown_requested() {
            return Err(abort(ctl, AbortReason::Shutdown));
        }
        if let Some(deadline) = params.deadline {
            if clock.now().saturating_duration_since(start) >= deadline {
                return Err(abort(ctl, AbortReason::Deadline));
            }
        }

        let t0 = clock.now();
        let running = match ctl.tick() {
            Ok(r) => r,
            Err(e) => {
                if let Err(stop_err) = ctl.stop() {
                    tracing::error!(error = %stop_err, "stop after tick error failed");
                }
                return Err(e.wrap_err("tick"));
            }
        };
        ticks += 1;
        worst_tick = worst_tick.max(clock.now().saturating_duration_since(t0));

        if !running {
            break;
        }

        next += params.period;
        let now = clock.now();
        if now < next {
            clock.sleep_until(next);
        } else {
            missed_periods += 1;
            next = now;
        }
    }

    let report = MoveReport {
        target,
        start_position,
        final_position: ctl.position_source().position(),
        outcome: ctl.outcome(),
        ticks,
        elapsed: clock.now().saturating_duration_since(start),
        worst_tick,
        missed_periods,
    };
    tracing::info!(
        target,
        final_position = report.final_position,
        outcome = report.outcome.map(MoveOutcome::name).unwrap_or("none"),
        ticks,
        missed_periods,
        "move complete"
    );
    Ok(report)
}

/// Move to an absolute `target` with the deadline sized from `timing`.
pub fn move_to<P, M>(
    ctl: &mut MotionController<P, M>,
    target: i64,
    timing: &FeederTiming,
    shutdown: Option<Arc<AtomicBool>>,
) -> Result<MoveReport>
where
    P: PositionSource,
    M: MotorActuator,
{
    let current = ctl.current_position()?;
    let mut params = RunParams::from_timing(timing, target < current);
    params.shutdown = shutdown;
    run_to_target(ctl, target, &params)
}

/// Feed the tape by `tenths` of a millimetre (negative feeds backward).
pub fn feed_tenths_mm<P, M>(
    ctl: &mut MotionController<P, M>,
    tenths: i64,
    timing: &FeederTiming,
    shutdown: Option<Arc<AtomicBool>>,
) -> Result<MoveReport>
where
    P: PositionSource,
    M: MotorActuator,
{
    let current = ctl.current_position()?;
    let target = current.saturating_add(tenths_mm_to_ticks(tenths, timing.ticks_per_010mm));
    tracing::debug!(tenths, current, target, "feed");
    move_to(ctl, target, timing, shutdown)
}
