#![no_main]
use feeder_core::{FeederTiming, MoveConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation must never panic; errors are fine.
    let Ok(cfg) = feeder_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // Anything the loader accepts, the controller must accept too.
    let move_cfg = MoveConfig::from(&cfg);
    assert!(move_cfg.validate().is_ok(), "{move_cfg:?}");
    let timing = FeederTiming::from(&cfg.feeder);
    assert!(timing.validate().is_ok(), "{timing:?}");
});
