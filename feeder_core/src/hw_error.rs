//! Maps `Box<dyn Error>` from trait boundaries to typed `FeederError`.
//!
//! The traits in `feeder_traits` use `Box<dyn Error + Send + Sync>` so any
//! adapter can plug in; this module turns those into our error enum, with an
//! optional feature-gated path for `feeder_hardware::HwError` downcasting.

use crate::error::FeederError;

/// Map a trait-boundary error to a typed `FeederError`.
///
/// Known hardware errors are downcast first; anything else falls back to
/// string matching.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FeederError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<feeder_hardware::error::HwError>() {
            return match hw {
                feeder_hardware::error::HwError::SpeedOutOfRange(_)
                | feeder_hardware::error::HwError::PwmMinOutOfRange(_) => {
                    FeederError::Config(hw.to_string())
                }
                other => FeederError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("out of range") {
        FeederError::Config(s)
    } else {
        FeederError::Hardware(s)
    }
}

/// Convenience for the `Box<dyn Error + Send + Sync>` the traits return.
pub fn map_hw_error_dyn(e: &(dyn std::error::Error + Send + Sync + 'static)) -> FeederError {
    map_hw_error(e)
}
