use std::sync::Arc;

use feeder_hardware::{EncoderCfg, HBridgeCfg, PlantCfg, simulated_feeder};
use feeder_traits::{ManualClock, MotorActuator, PositionSource};
use rstest::{fixture, rstest};

struct Bench {
    clock: ManualClock,
    enc: feeder_hardware::SimEncoder,
    bridge: feeder_hardware::SimBridge,
    sim: feeder_hardware::SimHandle,
}

fn bench_at(start_ticks: i64) -> Bench {
    let clock = ManualClock::new();
    let (enc, bridge, sim) = simulated_feeder(
        PlantCfg {
            start_ticks,
            ..PlantCfg::default()
        },
        HBridgeCfg::default(),
        EncoderCfg::default(),
        Arc::new(clock.clone()),
    )
    .expect("sim");
    Bench {
        clock,
        enc,
        bridge,
        sim,
    }
}

#[fixture]
fn bench() -> Bench {
    bench_at(0)
}

fn run_for(b: &mut Bench, ms: u64) {
    for _ in 0..ms / 10 {
        b.clock.advance_ms(10);
        b.enc.refresh().unwrap();
    }
}

#[rstest]
fn disabled_driver_does_not_move(mut bench: Bench) {
    bench.bridge.drive_set(80.0, None, false).unwrap();
    run_for(&mut bench, 200);
    assert_eq!(bench.enc.position(), 0);
}

#[rstest]
#[case(60.0, 1)]
#[case(-60.0, -1)]
fn driving_moves_in_commanded_direction(mut bench: Bench, #[case] speed: f32, #[case] sign: i64) {
    bench.bridge.enable(true).unwrap();
    bench.bridge.drive_set(speed, None, false).unwrap();
    run_for(&mut bench, 300);
    let pos = bench.enc.position();
    assert!(pos.signum() == sign && pos.abs() > 100, "pos={pos}");
    assert_eq!(bench.enc.direction() as i64, sign);
}

#[rstest]
fn brake_stops_faster_than_coast() {
    let mut braked = bench_at(0);
    let mut coasted = bench_at(0);
    for b in [&mut braked, &mut coasted] {
        b.bridge.enable(true).unwrap();
        b.bridge.drive_set(100.0, None, false).unwrap();
        run_for(b, 300);
    }
    let (b0, c0) = (braked.enc.position(), coasted.enc.position());
    braked.bridge.drive_set(0.0, Some(true), false).unwrap();
    coasted.bridge.drive_set(0.0, Some(false), false).unwrap();
    run_for(&mut braked, 300);
    run_for(&mut coasted, 300);
    let braked_run = braked.enc.position() - b0;
    let coasted_run = coasted.enc.position() - c0;
    assert!(braked_run < coasted_run, "brake {braked_run} vs coast {coasted_run}");
    assert!(braked.sim.velocity().abs() < 1.0);
}

#[rstest]
fn position_is_continuous_across_counter_wrap() {
    let mut b = bench_at(65_400);
    assert_eq!(b.enc.position(), 65_400);
    b.bridge.enable(true).unwrap();
    b.bridge.drive_set(100.0, None, false).unwrap();
    run_for(&mut b, 500);
    assert!(b.enc.position() > 65_535, "pos={}", b.enc.position());
    assert!(b.enc.raw() < 65_400);
}

#[rstest]
fn counter_fault_surfaces_on_refresh(mut bench: Bench) {
    bench.sim.inject_read_fault(true);
    let err = bench.enc.refresh().unwrap_err();
    assert!(err.to_string().contains("counter"), "{err}");
    bench.sim.inject_read_fault(false);
    assert!(bench.enc.refresh().is_ok());
}

#[rstest]
fn peel_time_is_accounted(mut bench: Bench) {
    bench.bridge.enable(true).unwrap();
    bench.bridge.peel_set(100.0, None, false).unwrap();
    run_for(&mut bench, 250);
    bench.bridge.peel_set(0.0, Some(false), false).unwrap();
    run_for(&mut bench, 100);
    assert_eq!(bench.sim.peel_active_ms(), 250);
    assert_eq!(bench.sim.peel_duties(), (0.0, 0.0));
}
