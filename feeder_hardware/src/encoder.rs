//! Quadrature encoder over a free-running hardware counter.
//!
//! The counter wraps at `max_count`; [`QuadratureEncoder::refresh`] folds each
//! sample into an absolute `i64` frame so the controller never sees a wrap.

use std::sync::Arc;
use std::time::Instant;

use feeder_traits::{Clock, PositionSource};

use crate::error::Result;

/// A raw up/down counter, e.g. a timer in encoder mode.
pub trait RawCounter {
    fn read(&mut self) -> Result<u32>;
    fn write(&mut self, value: u32) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct EncoderCfg {
    /// Highest raw value before the counter wraps to 0.
    pub max_count: u32,
    /// Ticks per output revolution, decoding multiplier included.
    pub ticks_per_revolution: u32,
    /// Flip the counting direction.
    pub invert: bool,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            max_count: 65_535,
            ticks_per_revolution: 28,
            invert: false,
        }
    }
}

/// Resolve the signed step between two raw samples of a counter that wraps
/// at `max_count`. Steps larger than half the range are taken to have wrapped.
#[inline]
pub fn wrapped_delta(raw: u32, last: u32, max_count: u32) -> i64 {
    let span = i64::from(max_count) + 1;
    let half = i64::from(max_count / 2);
    let mut delta = i64::from(raw) - i64::from(last);
    if delta.abs() > half {
        if delta > 0 {
            delta -= span;
        } else {
            delta += span;
        }
    }
    delta
}

pub struct QuadratureEncoder<C: RawCounter> {
    counter: C,
    cfg: EncoderCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    last_raw: u32,
    absolute: i64,
    delta: i64,
    direction: i8,
    rpm: f32,
    last_update: Instant,
}

impl<C: RawCounter> core::fmt::Debug for QuadratureEncoder<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuadratureEncoder")
            .field("absolute", &self.absolute)
            .field("delta", &self.delta)
            .field("rpm", &self.rpm)
            .finish()
    }
}

impl<C: RawCounter> QuadratureEncoder<C> {
    /// Take ownership of the counter and seed the frame from its current value.
    pub fn new(mut counter: C, cfg: EncoderCfg, clock: Arc<dyn Clock + Send + Sync>) -> Result<Self> {
        if cfg.ticks_per_revolution == 0 {
            tracing::warn!("ticks_per_revolution is 0; rpm will read as 0");
        }
        let initial = counter.read()?;
        let now = clock.now();
        tracing::info!(
            max_count = cfg.max_count,
            tpr = cfg.ticks_per_revolution,
            invert = cfg.invert,
            initial,
            "encoder init"
        );
        Ok(Self {
            counter,
            cfg,
            clock,
            last_raw: initial,
            absolute: i64::from(initial),
            delta: 0,
            direction: 0,
            rpm: 0.0,
            last_update: now,
        })
    }

    /// Zero the hardware counter and the absolute frame.
    pub fn reset(&mut self) -> Result<()> {
        self.counter.write(0)?;
        self.last_raw = 0;
        self.absolute = 0;
        self.delta = 0;
        self.direction = 0;
        self.rpm = 0.0;
        self.last_update = self.clock.now();
        tracing::debug!("encoder reset to 0");
        Ok(())
    }

    /// Move the absolute frame so the current count reads as `position`.
    /// The hardware counter is left untouched.
    pub fn rebase(&mut self, position: i64) {
        self.absolute = position;
        self.delta = 0;
    }

    pub fn update(&mut self) -> Result<()> {
        let now = self.clock.now();
        let raw = self.counter.read()?;

        let mut delta = wrapped_delta(raw, self.last_raw, self.cfg.max_count);
        if self.cfg.invert {
            delta = -delta;
        }

        self.delta = delta;
        self.absolute = self.absolute.saturating_add(delta);
        self.direction = delta.signum() as i8;

        let elapsed_ms = now.saturating_duration_since(self.last_update).as_millis() as u64;
        self.rpm = if self.cfg.ticks_per_revolution > 0 && elapsed_ms > 0 {
            let ticks_per_minute = (delta.unsigned_abs() as f64 * 60_000.0) / elapsed_ms as f64;
            let rpm = (ticks_per_minute / f64::from(self.cfg.ticks_per_revolution)) as f32;
            if delta >= 0 { rpm } else { -rpm }
        } else {
            0.0
        };

        self.last_raw = raw;
        self.last_update = now;
        Ok(())
    }

    pub fn raw(&self) -> u32 {
        self.last_raw
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }
}

impl<C: RawCounter> PositionSource for QuadratureEncoder<C> {
    fn refresh(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.update()?;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.absolute
    }

    fn direction(&self) -> i8 {
        self.direction
    }

    fn delta(&self) -> i64 {
        self.delta
    }

    fn rpm(&self) -> f32 {
        self.rpm
    }
}
