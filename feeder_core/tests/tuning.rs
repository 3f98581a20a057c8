mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use common::{no_peel, rig, rig_with_gain};
use feeder_core::{
    AbortReason, FeederError, FeederTiming, MoveOutcome, PidGains, run_profile, suggest_gains,
    summarize,
};

#[test]
fn every_pass_runs_every_move() {
    let mut r = rig(no_peel(), 1000);
    let moves = [400, -400, 150];
    let samples = run_profile(&mut r.ctl, &moves, 3, &FeederTiming::default(), None).unwrap();

    assert_eq!(samples.len(), 9);
    assert!(samples.iter().all(|s| !s.timed_out));
    assert!(samples.iter().all(|s| s.final_error().abs() <= 15), "{samples:?}");
    assert!(samples.iter().all(|s| s.outcome == Some(MoveOutcome::Settled)));
    assert_eq!(samples[0].target, 1400);
    assert_eq!(samples[1].relative, -400);
    assert_eq!(samples.last().unwrap().pass, 3);

    let summary = summarize(&moves, &samples);
    for s in &summary {
        assert_eq!((s.attempted, s.completed, s.timed_out), (3, 3, 0));
        assert!(s.abs_error.unwrap().max <= 15.0);
        assert!(s.settle_ms.unwrap().min > 0.0);
    }
    // the backward move runs two legs, so it takes longer than the same
    // distance forward
    assert!(summary[1].settle_ms.unwrap().mean > summary[0].settle_ms.unwrap().mean);
}

#[test]
fn timeout_skips_rest_of_pass() {
    let mut r = rig_with_gain(no_peel(), 0, 0.0);
    let samples =
        run_profile(&mut r.ctl, &[400, -400], 2, &FeederTiming::default(), None).unwrap();

    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.timed_out && s.index == 0));
    assert_eq!(r.plant.drive_speeds().last().copied(), Some(0.0));

    let summary = summarize(&[400, -400], &samples);
    assert_eq!((summary[0].attempted, summary[0].timed_out), (2, 2));
    assert!(summary[0].abs_error.is_none());
    assert_eq!(summary[1].attempted, 0);
    // nothing completed, nothing to go on
    assert_eq!(suggest_gains(PidGains::default(), &summary), PidGains::default());
}

#[test]
fn shutdown_ends_the_whole_profile() {
    let mut r = rig(no_peel(), 0);
    let flag = Arc::new(AtomicBool::new(true));
    let err = run_profile(&mut r.ctl, &[400], 5, &FeederTiming::default(), Some(flag))
        .expect_err("shutdown");
    assert!(matches!(
        err.downcast_ref::<FeederError>(),
        Some(FeederError::Abort(AbortReason::Shutdown))
    ));
}

#[test]
fn out_of_range_relative_move_is_a_config_error() {
    let mut r = rig(no_peel(), 10);
    let err = run_profile(&mut r.ctl, &[i64::MAX], 1, &FeederTiming::default(), None)
        .expect_err("overflow");
    assert!(matches!(
        err.downcast_ref::<FeederError>(),
        Some(FeederError::Config(_))
    ));
    assert!(r.plant.drive_speeds().is_empty());
}
