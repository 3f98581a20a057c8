//! Hardware adapters for the tape feeder: a wrapping quadrature encoder,
//! a dual H-bridge, and a simulated plant that stands in for both.

pub mod encoder;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod hbridge;
pub mod sim;
pub mod util;

pub use encoder::{EncoderCfg, QuadratureEncoder, RawCounter};
pub use error::HwError;
pub use hbridge::{BridgeStatus, EnableLine, HBridge, HBridgeCfg, PwmChannel};
pub use sim::{PlantCfg, SimBridge, SimEncoder, SimHandle, simulated_feeder};
