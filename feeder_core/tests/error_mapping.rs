use feeder_core::FeederError;
use feeder_core::hw_error::{map_hw_error, map_hw_error_dyn};
use feeder_hardware::HwError;
use rstest::rstest;

#[rstest]
#[case(HwError::SpeedOutOfRange(140.0), "config")]
#[case(HwError::PwmMinOutOfRange(-3.0), "config")]
#[case(HwError::Gpio("pin 17 busy".into()), "fault")]
#[case(HwError::CounterRead("timeout".into()), "fault")]
fn hardware_errors_are_downcast(#[case] err: HwError, #[case] kind: &str) {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    match (map_hw_error_dyn(&*boxed), kind) {
        (FeederError::Config(msg), "config") => assert!(msg.contains("out of range")),
        (FeederError::HardwareFault(_), "fault") => {}
        (other, kind) => panic!("expected {kind}, got {other:?}"),
    }
}

#[rstest]
#[case("duty Out Of Range", true)]
#[case("i2c nack", false)]
fn foreign_errors_fall_back_to_message(#[case] msg: &str, #[case] config: bool) {
    let e = std::io::Error::other(msg.to_string());
    let mapped = map_hw_error(&e);
    if config {
        assert!(matches!(mapped, FeederError::Config(_)));
    } else {
        assert!(matches!(mapped, FeederError::Hardware(ref m) if m == msg));
    }
}

#[test]
fn display_strings() {
    assert_eq!(
        FeederError::Abort(feeder_core::AbortReason::Deadline).to_string(),
        "move aborted: deadline exceeded"
    );
    assert_eq!(
        FeederError::Abort(feeder_core::AbortReason::Shutdown).to_string(),
        "move aborted: shutdown requested"
    );
}
