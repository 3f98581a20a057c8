use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("encoder counter read failed: {0}")]
    CounterRead(String),
    #[error("speed {0} out of range (-100..=100)")]
    SpeedOutOfRange(f32),
    #[error("pwm minimum {0} out of range (0..=100)")]
    PwmMinOutOfRange(f32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
