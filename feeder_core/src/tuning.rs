//! Gain profiling: repeat a list of relative moves, collect how each one
//! ended, and derive a gain suggestion from the aggregate.
//!
//! A move that misses its deadline is recorded as timed out and ends the
//! current pass; the remaining moves of that pass are skipped.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use feeder_traits::{MotorActuator, PositionSource};

use crate::config::{FeederTiming, PidGains};
use crate::controller::MotionController;
use crate::error::{AbortReason, FeederError, Result};
use crate::runner::{RunParams, run_to_target};
use crate::status::MoveOutcome;

/// Relative moves used when none are given.
pub const DEFAULT_MOVES: [i64; 3] = [900, 450, -900];
pub const DEFAULT_PASSES: u32 = 5;

const PAUSE_BETWEEN_MOVES: Duration = Duration::from_millis(200);
const PAUSE_BETWEEN_PASSES: Duration = Duration::from_millis(500);

// Suggestion targets, in ticks.
const TARGET_ERROR: f64 = 5.0;
const TARGET_OVERSHOOT: f64 = 5.0;

/// Outcome of one move in one pass.
#[derive(Debug, Clone)]
pub struct MoveSample {
    pub pass: u32,
    /// Position of the move in the sequence.
    pub index: usize,
    pub relative: i64,
    pub target: i64,
    pub final_position: i64,
    pub settle: Duration,
    pub outcome: Option<MoveOutcome>,
    pub timed_out: bool,
}

impl MoveSample {
    pub fn final_error(&self) -> i64 {
        self.final_position.saturating_sub(self.target)
    }

    /// Travel past the target in the direction of the move; 0 otherwise.
    pub fn directional_overshoot(&self) -> i64 {
        if self.relative > 0 && self.final_position > self.target {
            self.final_position - self.target
        } else if self.relative < 0 && self.final_position < self.target {
            self.target - self.final_position
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl Stats {
    /// `None` for an empty slice.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };
        Some(Self {
            mean,
            stddev: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
        })
    }
}

/// Aggregate of every pass for one entry of the move list.
#[derive(Debug, Clone)]
pub struct MoveTypeSummary {
    pub index: usize,
    pub relative: i64,
    pub attempted: usize,
    pub completed: usize,
    pub timed_out: usize,
    /// Absolute final error, ticks.
    pub abs_error: Option<Stats>,
    pub settle_ms: Option<Stats>,
    pub overshoot: Option<Stats>,
}

/// Group `samples` by their position in `moves`. Timed-out samples count
/// as attempts but stay out of the statistics.
pub fn summarize(moves: &[i64], samples: &[MoveSample]) -> Vec<MoveTypeSummary> {
    moves
        .iter()
        .enumerate()
        .map(|(index, &relative)| {
            let of_type: Vec<&MoveSample> = samples.iter().filter(|s| s.index == index).collect();
            let done: Vec<&MoveSample> = of_type.iter().copied().filter(|s| !s.timed_out).collect();
            let abs_error: Vec<f64> = done
                .iter()
                .map(|s| s.final_error().unsigned_abs() as f64)
                .collect();
            let settle: Vec<f64> = done
                .iter()
                .map(|s| s.settle.as_micros() as f64 / 1000.0)
                .collect();
            let overshoot: Vec<f64> = done
                .iter()
                .map(|s| s.directional_overshoot() as f64)
                .collect();
            MoveTypeSummary {
                index,
                relative,
                attempted: of_type.len(),
                completed: done.len(),
                timed_out: of_type.len() - done.len(),
                abs_error: Stats::of(&abs_error),
                settle_ms: Stats::of(&settle),
                overshoot: Stats::of(&overshoot),
            }
        })
        .collect()
}

fn round4(v: f32) -> f32 {
    (v * 10_000.0).round() / 10_000.0
}

/// Nudge the gains toward the error and overshoot targets.
///
/// Too much residual error raises P and I; too much overshoot raises D
/// (and trims P when the error is already fine). Results are clamped to
/// `kp ∈ [0.01, 1]`, `ki ∈ [0, 0.1]`, `kd ∈ [0, 0.2]` and rounded to four
/// decimals.
pub fn suggest_gains(current: PidGains, summaries: &[MoveTypeSummary]) -> PidGains {
    if summaries.is_empty() {
        return current;
    }
    let n = summaries.len() as f64;
    let avg_error = summaries
        .iter()
        .map(|s| s.abs_error.map_or(0.0, |e| e.mean))
        .sum::<f64>()
        / n;
    let avg_overshoot = summaries
        .iter()
        .map(|s| s.overshoot.map_or(0.0, |o| o.mean))
        .sum::<f64>()
        / n;

    let error_factor = (avg_error / TARGET_ERROR).clamp(1.0, 3.0) as f32;
    let overshoot_factor = (avg_overshoot / TARGET_OVERSHOOT).clamp(1.0, 3.0) as f32;
    let PidGains { mut kp, mut ki, mut kd } = current;

    match (avg_error > TARGET_ERROR, avg_overshoot > TARGET_OVERSHOOT) {
        (true, true) => {
            kp *= 1.0 + 0.05 * error_factor;
            ki *= 1.0 + 0.05 * error_factor;
            kd *= 1.0 + 0.10 * overshoot_factor;
        }
        (true, false) => {
            kp *= 1.0 + 0.10 * error_factor;
            ki *= 1.0 + 0.10 * error_factor;
        }
        (false, true) => {
            kp *= 0.95;
            kd *= 1.0 + 0.15 * overshoot_factor;
        }
        (false, false) => {}
    }

    PidGains {
        kp: round4(kp.clamp(0.01, 1.0)),
        ki: round4(ki.clamp(0.0, 0.1)),
        kd: round4(kd.clamp(0.0, 0.2)),
    }
}

/// Run `moves` (relative, ticks) `passes` times with the controller's
/// current gains. Each move gets the deadline `timing` sizes for its
/// direction.
///
/// Shutdown and hardware errors end the whole profile; deadlines only end
/// the pass they happen in.
pub fn run_profile<P, M>(
    ctl: &mut MotionController<P, M>,
    moves: &[i64],
    passes: u32,
    timing: &FeederTiming,
    shutdown: Option<Arc<AtomicBool>>,
) -> Result<Vec<MoveSample>>
where
    P: PositionSource,
    M: MotorActuator,
{
    let clock = ctl.clock().clone();
    let mut samples = Vec::with_capacity(moves.len() * passes as usize);

    for pass in 1..=passes {
        tracing::info!(pass, passes, ?moves, gains = ?ctl.config().gains, "profile pass");
        for (index, &relative) in moves.iter().enumerate() {
            let start = ctl.current_position()?;
            let Some(target) = start.checked_add(relative) else {
                return Err(FeederError::Config(format!(
                    "relative move {relative} from {start} is out of range"
                ))
                .into());
            };
            let mut params = RunParams::from_timing(timing, relative < 0);
            params.shutdown = shutdown.clone();

            let t0 = clock.now();
            let sample = match run_to_target(ctl, target, &params) {
                Ok(report) => MoveSample {
                    pass,
                    index,
                    relative,
                    target,
                    final_position: report.final_position,
                    settle: report.elapsed,
                    outcome: report.outcome,
                    timed_out: false,
                },
                Err(e) => match e.downcast_ref::<FeederError>() {
                    Some(FeederError::Abort(AbortReason::Deadline)) => MoveSample {
                        pass,
                        index,
                        relative,
                        target,
                        final_position: ctl.position_source().position(),
                        settle: clock.now().saturating_duration_since(t0),
                        outcome: None,
                        timed_out: true,
                    },
                    _ => return Err(e),
                },
            };
            tracing::info!(
                pass,
                index,
                relative,
                target,
                final_position = sample.final_position,
                error = sample.final_error(),
                settle_ms = sample.settle.as_millis() as u64,
                timed_out = sample.timed_out,
                "profile move"
            );
            let timed_out = sample.timed_out;
            samples.push(sample);
            if timed_out {
                tracing::warn!(pass, index, "move timed out, rest of pass skipped");
                break;
            }
            clock.sleep(PAUSE_BETWEEN_MOVES);
        }
        if pass < passes {
            clock.sleep(PAUSE_BETWEEN_PASSES);
        }
    }
    Ok(samples)
}
