//! Move phases and outcomes reported by the controller.

/// Where the current move is. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No move in progress; the last target was reached or abandoned.
    #[default]
    Idle,
    /// Backward move queued behind a peel run from the previous move.
    WaitPeelBeforeReverseLeg,
    /// Driving backward to the overshoot point.
    ReverseLeg,
    /// Overshoot point reached; waiting for the peel motor before approaching.
    WaitPeelBeforeForwardLeg,
    /// Approaching the setpoint from below, ramp then PID.
    ForwardLeg,
}

impl Phase {
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Phase::WaitPeelBeforeReverseLeg | Phase::WaitPeelBeforeForwardLeg
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::WaitPeelBeforeReverseLeg => "wait-peel-reverse",
            Phase::ReverseLeg => "reverse-leg",
            Phase::WaitPeelBeforeForwardLeg => "wait-peel-forward",
            Phase::ForwardLeg => "forward-leg",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the last move ended. `None` on the controller while a move runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Held within tolerance for the required number of ticks.
    Settled,
    /// Within tolerance when the leg started.
    AlreadyAtTarget,
    /// Ran past the setpoint by more than the tolerance and gave up.
    Overshoot,
    /// Cut short by `stop()` or by disabling the driver.
    Stopped,
}

impl MoveOutcome {
    pub fn name(self) -> &'static str {
        match self {
            MoveOutcome::Settled => "settled",
            MoveOutcome::AlreadyAtTarget => "already-at-target",
            MoveOutcome::Overshoot => "overshoot",
            MoveOutcome::Stopped => "stopped",
        }
    }
}

impl core::fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
