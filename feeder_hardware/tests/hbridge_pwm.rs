use std::cell::Cell;
use std::rc::Rc;

use feeder_hardware::error::Result;
use feeder_hardware::hbridge::{BridgeStatus, EnableLine, HBridge, HBridgeCfg, PwmChannel};
use feeder_traits::MotorActuator;
use rstest::rstest;

#[derive(Clone, Default)]
struct FakePwm(Rc<Cell<f32>>);

impl PwmChannel for FakePwm {
    fn set_duty_percent(&mut self, duty: f32) -> Result<()> {
        self.0.set(duty);
        Ok(())
    }
    fn duty_percent(&self) -> f32 {
        self.0.get()
    }
}

#[derive(Clone, Default)]
struct FakeEnable(Rc<Cell<Option<bool>>>);

impl EnableLine for FakeEnable {
    fn set_active(&mut self, level_high: bool) -> Result<()> {
        self.0.set(Some(level_high));
        Ok(())
    }
}

struct Rig {
    bridge: HBridge<FakePwm, FakeEnable>,
    d1: FakePwm,
    d2: FakePwm,
    p1: FakePwm,
    p2: FakePwm,
    en: FakeEnable,
}

fn rig(cfg: HBridgeCfg) -> Rig {
    let (d1, d2, p1, p2) = (
        FakePwm::default(),
        FakePwm::default(),
        FakePwm::default(),
        FakePwm::default(),
    );
    let en = FakeEnable::default();
    let bridge = HBridge::new(d1.clone(), d2.clone(), p1.clone(), p2.clone(), en.clone(), cfg)
        .expect("bridge");
    Rig {
        bridge,
        d1,
        d2,
        p1,
        p2,
        en,
    }
}

fn drive(r: &Rig) -> (f32, f32) {
    (r.d1.0.get(), r.d2.0.get())
}

#[test]
fn starts_disabled_and_ignores_commands() {
    let mut r = rig(HBridgeCfg::default());
    assert!(!r.bridge.enabled());
    assert_eq!(r.en.0.get(), Some(false));
    r.bridge.drive_set(50.0, None, false).unwrap();
    assert_eq!(drive(&r), (0.0, 0.0));
}

#[rstest]
#[case(50.0, (82.0, 0.0), BridgeStatus::Forward)]
#[case(-50.0, (0.0, 82.0), BridgeStatus::Reverse)]
#[case(100.0, (100.0, 0.0), BridgeStatus::Forward)]
#[case(1.0, (65.0, 0.0), BridgeStatus::Forward)]
fn relative_speed_maps_above_floor(
    #[case] speed: f32,
    #[case] expected: (f32, f32),
    #[case] status: BridgeStatus,
) {
    let mut r = rig(HBridgeCfg::default());
    r.bridge.enable(true).unwrap();
    r.bridge.drive_set(speed, None, false).unwrap();
    assert_eq!(drive(&r), expected);
    assert_eq!(r.bridge.drive_status(), status);
}

#[rstest]
#[case(None, (100.0, 100.0), BridgeStatus::Brake)]
#[case(Some(true), (100.0, 100.0), BridgeStatus::Brake)]
#[case(Some(false), (0.0, 0.0), BridgeStatus::Stop)]
fn zero_speed_brakes_or_coasts(
    #[case] brake: Option<bool>,
    #[case] expected: (f32, f32),
    #[case] status: BridgeStatus,
) {
    let mut r = rig(HBridgeCfg::default());
    r.bridge.enable(true).unwrap();
    r.bridge.drive_set(30.0, None, false).unwrap();
    r.bridge.drive_set(0.0, brake, false).unwrap();
    assert_eq!(drive(&r), expected);
    assert_eq!(r.bridge.drive_status(), status);
}

#[test]
fn autobrake_off_coasts_by_default() {
    let mut r = rig(HBridgeCfg {
        autobrake: false,
        ..HBridgeCfg::default()
    });
    r.bridge.enable(true).unwrap();
    r.bridge.drive_set(0.0, None, false).unwrap();
    assert_eq!(r.bridge.drive_status(), BridgeStatus::Stop);
}

#[test]
fn absolute_pwm_bypasses_floor() {
    let mut r = rig(HBridgeCfg::default());
    r.bridge.enable(true).unwrap();
    r.bridge.peel_set(-40.0, None, true).unwrap();
    assert_eq!((r.p1.0.get(), r.p2.0.get()), (0.0, 40.0));
    assert_eq!(r.bridge.peel_status(), BridgeStatus::Reverse);
    // below the floor the readback is 0
    assert_eq!(r.bridge.peel_speed(), 0.0);
}

#[test]
fn invert_swaps_channels() {
    let mut r = rig(HBridgeCfg {
        drive_invert: true,
        ..HBridgeCfg::default()
    });
    r.bridge.enable(true).unwrap();
    r.bridge.drive_set(100.0, None, false).unwrap();
    assert_eq!(drive(&r), (0.0, 100.0));
    assert_eq!(r.bridge.drive_speed(), 100.0);
}

#[test]
fn active_low_enable_line() {
    let mut r = rig(HBridgeCfg {
        enable_invert: true,
        ..HBridgeCfg::default()
    });
    assert_eq!(r.en.0.get(), Some(true));
    r.bridge.enable(true).unwrap();
    assert_eq!(r.en.0.get(), Some(false));
    assert!(r.bridge.enabled());
}

#[rstest]
#[case(100.5)]
#[case(-101.0)]
#[case(f32::NAN)]
fn out_of_range_speed_is_rejected(#[case] speed: f32) {
    let mut r = rig(HBridgeCfg::default());
    r.bridge.enable(true).unwrap();
    let err = r.bridge.drive_set(speed, None, false).unwrap_err();
    assert!(err.to_string().contains("out of range"), "{err}");
}

#[test]
fn pwm_floor_outside_percent_fails_construction() {
    let res = HBridge::new(
        FakePwm::default(),
        FakePwm::default(),
        FakePwm::default(),
        FakePwm::default(),
        FakeEnable::default(),
        HBridgeCfg {
            peel_pwm_min: 120.0,
            ..HBridgeCfg::default()
        },
    );
    assert!(res.is_err());
}
