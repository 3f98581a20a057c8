//! `From` implementations bridging `feeder_config` types to `feeder_core`
//! types, so the CLI never maps fields by hand.

use crate::config::{FeederTiming, MoveConfig, PidGains};

// ── MoveConfig ───────────────────────────────────────────────────────────────

impl From<&feeder_config::ServoCfg> for PidGains {
    fn from(c: &feeder_config::ServoCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
        }
    }
}

impl From<&feeder_config::Config> for MoveConfig {
    fn from(c: &feeder_config::Config) -> Self {
        let s = &c.servo;
        Self {
            gains: PidGains::from(s),
            max_output: s.max_output,
            min_output: s.min_output,
            tolerance: s.tolerance,
            backlash_takeup: s.takeup,
            ramp_ticks: s.ramp_ticks,
            ramp_taper_percent: s.ramp_taper,
            stable_updates: s.updates,
            derivative_alpha: s.derivative_alpha,
            brake_on_stop: s.brake,
            peel_enabled: s.peel_enable,
            peel_speed: s.peel_speed,
            peel_run_ms: s.peel_run_ms,
            nominal_period_ms: c.feeder.loop_interval_ms,
        }
    }
}

// ── FeederTiming ─────────────────────────────────────────────────────────────

impl From<&feeder_config::FeederCfg> for FeederTiming {
    fn from(c: &feeder_config::FeederCfg) -> Self {
        Self {
            ticks_per_010mm: c.ticks_010mm,
            loop_interval_ms: c.loop_interval_ms,
            forward_ms: c.forward_ms,
            backward_ms: c.backward_ms,
            deadline_factor: c.deadline_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_core_defaults() {
        let cfg = feeder_config::Config::default();
        let mv = MoveConfig::from(&cfg);
        let core = MoveConfig::default();
        assert_eq!(mv.gains, core.gains);
        assert_eq!(mv.tolerance, core.tolerance);
        assert_eq!(mv.overshoot_ticks(), core.overshoot_ticks());
        assert_eq!(mv.nominal_period_ms, core.nominal_period_ms);
        let timing = FeederTiming::from(&cfg.feeder);
        assert_eq!(timing.backward_ms, FeederTiming::default().backward_ms);
    }
}
