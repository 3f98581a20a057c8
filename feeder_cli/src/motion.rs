//! Command execution: moves, feeds, manual peel runs and the self-check,
//! plus the result lines printed for each.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eyre::{Result, WrapErr};
use feeder_config::Config;
use feeder_core::error::{AbortReason, FeederError};
use feeder_core::util::{loop_period, tenths_mm_to_ticks};
use feeder_core::tuning::{MoveTypeSummary, Stats, run_profile, suggest_gains, summarize};
use feeder_core::{
    FeederTiming, MotionController, MoveReport, PeelDirection, PidGains, RunParams, run_to_target,
};
use feeder_traits::{MotorActuator, PositionSource};
use serde_json::json;

use crate::cli::{Commands, LAST_DEADLINE_MS};

pub fn abort_reason_name(r: &AbortReason) -> &'static str {
    match r {
        AbortReason::Deadline => "Deadline",
        AbortReason::Shutdown => "Shutdown",
    }
}

fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Run one CLI command against an assembled controller.
pub fn execute<P, M>(
    ctl: &mut MotionController<P, M>,
    cmd: &Commands,
    cfg: &Config,
    backend: &str,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()>
where
    P: PositionSource,
    M: MotorActuator,
{
    let timing = FeederTiming::from(&cfg.feeder);
    match *cmd {
        Commands::Move { to, deadline_ms } => {
            run_move(ctl, "move", to, &timing, deadline_ms, backend, json, shutdown)
        }
        Commands::Feed {
            tenths,
            deadline_ms,
        } => {
            let current = ctl.current_position().wrap_err("read position")?;
            let target = current.saturating_add(tenths_mm_to_ticks(tenths, timing.ticks_per_010mm));
            tracing::debug!(tenths, current, target, "feed");
            run_move(ctl, "feed", target, &timing, deadline_ms, backend, json, shutdown)
        }
        Commands::Peel {
            direction,
            ms,
            speed,
        } => {
            let ms = ms.unwrap_or(cfg.servo.peel_run_ms);
            let speed = speed.unwrap_or(cfg.servo.peel_speed);
            run_peel(ctl, direction.into(), ms, speed, &timing, json, shutdown)
        }
        Commands::Profile {
            ref moves,
            runs,
            rounds,
            peel,
        } => run_profile_rounds(ctl, moves, runs, rounds, peel, &timing, backend, json, shutdown),
        Commands::SelfCheck => self_check(ctl, backend, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_move<P, M>(
    ctl: &mut MotionController<P, M>,
    command: &str,
    target: i64,
    timing: &FeederTiming,
    deadline_ms: Option<u64>,
    backend: &str,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()>
where
    P: PositionSource,
    M: MotorActuator,
{
    let current = ctl.current_position().wrap_err("read position")?;
    let mut params = RunParams::from_timing(timing, target < current).with_shutdown(shutdown.clone());
    if let Some(ms) = deadline_ms {
        params.deadline = Some(Duration::from_millis(ms));
    }
    if let Some(d) = params.deadline {
        let _ = LAST_DEADLINE_MS.set(d.as_millis() as u64);
    }

    let clock = ctl.clock().clone();
    let started = clock.now();
    match run_to_target(ctl, target, &params) {
        Ok(report) => {
            print_report(command, backend, &report, json);
            ctl.enable(false).wrap_err("disable driver")?;
            Ok(())
        }
        Err(e) => {
            if json {
                let abort = match e.downcast_ref::<FeederError>() {
                    Some(FeederError::Abort(r)) => abort_reason_name(r),
                    _ => "Error",
                };
                let line = json!({
                    "timestamp": unix_ms(),
                    "command": command,
                    "backend": backend,
                    "target": target,
                    "start_position": current,
                    "final_position": ctl.position_source().position(),
                    "outcome": null,
                    "ticks": null,
                    "duration_ms": clock.now().saturating_duration_since(started).as_millis() as u64,
                    "missed_periods": null,
                    "abort_reason": abort,
                });
                println!("{line}");
            }
            Err(e)
        }
    }
}

fn print_report(command: &str, backend: &str, r: &MoveReport, json: bool) {
    let outcome = r.outcome.map(|o| o.name());
    if json {
        let line = json!({
            "timestamp": unix_ms(),
            "command": command,
            "backend": backend,
            "target": r.target,
            "start_position": r.start_position,
            "final_position": r.final_position,
            "error": r.error(),
            "outcome": outcome,
            "ticks": r.ticks,
            "duration_ms": r.elapsed.as_millis() as u64,
            "worst_tick_us": r.worst_tick.as_micros() as u64,
            "missed_periods": r.missed_periods,
            "abort_reason": null,
        });
        println!("{line}");
    } else {
        println!(
            "{command} complete: target {} reached {} ({}), error {} ticks, {} ticks in {} ms",
            r.target,
            r.final_position,
            outcome.unwrap_or("none"),
            r.error(),
            r.ticks,
            r.elapsed.as_millis()
        );
        if r.missed_periods > 0 {
            eprintln!("warning: control loop fell behind {} times", r.missed_periods);
        }
    }
}

fn run_peel<P, M>(
    ctl: &mut MotionController<P, M>,
    direction: PeelDirection,
    ms: u32,
    speed: f32,
    timing: &FeederTiming,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()>
where
    P: PositionSource,
    M: MotorActuator,
{
    if !(0.0..=100.0).contains(&speed) {
        return Err(FeederError::Config(format!("peel speed {speed} must be in [0, 100]")).into());
    }
    if !ctl.config().peel_enabled {
        tracing::warn!("servo.peel_enable is false, nothing to do");
        if json {
            println!("{}", json!({ "timestamp": unix_ms(), "command": "peel", "ran": false }));
        } else {
            println!("peel disabled in config (servo.peel_enable = false)");
        }
        return Ok(());
    }

    ctl.enable(true).wrap_err("enable driver")?;
    let clock = ctl.clock().clone();
    let period = loop_period(timing.loop_interval_ms);
    let started = clock.now();
    ctl.peel_run(direction, ms, speed).wrap_err("peel_run")?;

    while !ctl.peel().is_idle() {
        if shutdown.load(Ordering::Relaxed) {
            ctl.stop().wrap_err("stop")?;
            return Err(FeederError::Abort(AbortReason::Shutdown).into());
        }
        clock.sleep(period);
        ctl.tick().wrap_err("tick")?;
    }
    ctl.enable(false).wrap_err("disable driver")?;

    let ran_ms = clock.now().saturating_duration_since(started).as_millis() as u64;
    if json {
        let line = json!({
            "timestamp": unix_ms(),
            "command": "peel",
            "ran": true,
            "direction": direction.name(),
            "speed": speed,
            "duration_ms": ran_ms,
        });
        println!("{line}");
    } else {
        println!("peel {direction} at {speed}% for {ran_ms} ms");
    }
    Ok(())
}

fn gains_json(g: &PidGains) -> serde_json::Value {
    json!({ "kp": g.kp, "ki": g.ki, "kd": g.kd })
}

fn stats_json(s: Option<Stats>) -> serde_json::Value {
    match s {
        Some(s) => json!({
            "mean": s.mean,
            "stddev": s.stddev,
            "min": s.min,
            "max": s.max,
            "median": s.median,
        }),
        None => serde_json::Value::Null,
    }
}

fn summary_json(s: &MoveTypeSummary) -> serde_json::Value {
    json!({
        "relative": s.relative,
        "attempted": s.attempted,
        "completed": s.completed,
        "timed_out": s.timed_out,
        "abs_error": stats_json(s.abs_error),
        "settle_ms": stats_json(s.settle_ms),
        "overshoot": stats_json(s.overshoot),
    })
}

fn print_summary_line(s: &MoveTypeSummary) {
    let mut line = format!("  move {:+}: {}/{} settled", s.relative, s.completed, s.attempted);
    if let (Some(e), Some(t), Some(o)) = (s.abs_error, s.settle_ms, s.overshoot) {
        line.push_str(&format!(
            ", error {:.2} ± {:.2} ticks, settle {:.0} ± {:.0} ms, overshoot max {:.0} ticks",
            e.mean, e.stddev, t.mean, t.stddev, o.max
        ));
    }
    if s.timed_out > 0 {
        line.push_str(&format!(", {} timed out", s.timed_out));
    }
    println!("{line}");
}

#[allow(clippy::too_many_arguments)]
fn run_profile_rounds<P, M>(
    ctl: &mut MotionController<P, M>,
    moves: &[i64],
    runs: u32,
    rounds: u32,
    peel: bool,
    timing: &FeederTiming,
    backend: &str,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()>
where
    P: PositionSource,
    M: MotorActuator,
{
    if moves.is_empty() {
        return Err(FeederError::Config("profile needs at least one move".into()).into());
    }
    ctl.peel_enable(peel).wrap_err("peel_enable")?;

    for round in 1..=rounds {
        let gains = ctl.config().gains;
        let samples = run_profile(ctl, moves, runs, timing, Some(shutdown.clone()))
            .wrap_err_with(|| format!("profile round {round}"))?;
        let summary = summarize(moves, &samples);
        let suggested = suggest_gains(gains, &summary);
        tracing::info!(round, ?gains, ?suggested, "profile round complete");

        if json {
            let line = json!({
                "timestamp": unix_ms(),
                "command": "profile",
                "backend": backend,
                "round": round,
                "runs": runs,
                "gains": gains_json(&gains),
                "moves": summary.iter().map(summary_json).collect::<Vec<_>>(),
                "suggested": gains_json(&suggested),
            });
            println!("{line}");
        } else {
            println!(
                "profile round {round}/{rounds} ({backend}, {runs} runs) kp={:.4} ki={:.4} kd={:.4}",
                gains.kp, gains.ki, gains.kd
            );
            summary.iter().for_each(print_summary_line);
            println!(
                "suggested gains: kp={:.4} ki={:.4} kd={:.4}",
                suggested.kp, suggested.ki, suggested.kd
            );
        }

        if round < rounds {
            ctl.set_gains(suggested).wrap_err("set_gains")?;
        }
    }
    ctl.enable(false).wrap_err("disable driver")?;
    Ok(())
}

fn self_check<P, M>(ctl: &mut MotionController<P, M>, backend: &str, json: bool) -> Result<()>
where
    P: PositionSource,
    M: MotorActuator,
{
    let position = ctl.current_position().wrap_err("read position")?;
    ctl.enable(true).wrap_err("enable driver")?;
    ctl.stop().wrap_err("stop")?;
    ctl.enable(false).wrap_err("disable driver")?;
    tracing::info!(backend, position, "self-check ok");
    if json {
        println!("{}", json!({ "self_check": "ok", "backend": backend, "position": position }));
    } else {
        println!("self-check ok ({backend}): position {position}");
    }
    Ok(())
}
