//! Type-state builder for a boxed `Controller` and the generic
//! `build_controller` constructor.
//!
//! The builder enforces at compile time that a position source and an
//! actuator are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use feeder_traits::{Clock, MonotonicClock, MotorActuator, PositionSource};

use crate::config::{MoveConfig, PidGains};
use crate::controller::MotionController;
use crate::error::{BuildError, Result};

/// Dynamically dispatched controller, as produced by [`ControllerBuilder`].
pub type Controller = MotionController<Box<dyn PositionSource>, Box<dyn MotorActuator>>;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct ControllerBuilder<P, A> {
    position: Option<Box<dyn PositionSource>>,
    actuator: Option<Box<dyn MotorActuator>>,
    config: Option<MoveConfig>,
    gains: Option<PidGains>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _p: PhantomData<P>,
    _a: PhantomData<A>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            position: None,
            actuator: None,
            config: None,
            gains: None,
            clock: None,
            _p: PhantomData,
            _a: PhantomData,
        }
    }
}

impl Controller {
    /// Start building a boxed controller.
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }
}

impl<P, A> ControllerBuilder<P, A> {
    /// Fallible build available in any type-state; names the missing piece.
    pub fn try_build(self) -> Result<Controller> {
        let position = self
            .position
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPositionSource))?;
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let mut config = self.config.unwrap_or_default();
        if let Some(g) = self.gains {
            config.gains = g;
        }
        build_controller(position, actuator, config, self.clock)
    }

    pub fn with_config(mut self, config: MoveConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override just the gains of whatever config ends up in use.
    pub fn with_gains(mut self, gains: PidGains) -> Self {
        self.gains = Some(gains);
        self
    }

    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<A> ControllerBuilder<Missing, A> {
    pub fn with_position_source(
        self,
        position: impl PositionSource + 'static,
    ) -> ControllerBuilder<Set, A> {
        ControllerBuilder {
            position: Some(Box::new(position)),
            actuator: self.actuator,
            config: self.config,
            gains: self.gains,
            clock: self.clock,
            _p: PhantomData,
            _a: PhantomData,
        }
    }
}

impl<P> ControllerBuilder<P, Missing> {
    pub fn with_actuator(self, actuator: impl MotorActuator + 'static) -> ControllerBuilder<P, Set> {
        ControllerBuilder {
            position: self.position,
            actuator: Some(Box::new(actuator)),
            config: self.config,
            gains: self.gains,
            clock: self.clock,
            _p: PhantomData,
            _a: PhantomData,
        }
    }
}

impl ControllerBuilder<Set, Set> {
    /// Validate and build. Only available once both hardware pieces are set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}

/// Build a statically dispatched controller from concrete hardware.
///
/// Shares validation with the builder through `MotionController::new`.
pub fn build_controller<P, M>(
    position: P,
    motor: M,
    config: MoveConfig,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<MotionController<P, M>>
where
    P: PositionSource,
    M: MotorActuator,
{
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    MotionController::new(position, motor, config, clock)
}
