use thiserror::Error;

/// Why a supervised move was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The move did not finish inside its wall-clock budget.
    Deadline,
    /// An operator or signal handler asked the run to stop.
    Shutdown,
}

impl core::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AbortReason::Deadline => f.write_str("deadline exceeded"),
            AbortReason::Shutdown => f.write_str("shutdown requested"),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum FeederError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("move aborted: {0}")]
    Abort(AbortReason),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing position source")]
    MissingPositionSource,
    #[error("missing motor actuator")]
    MissingActuator,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
