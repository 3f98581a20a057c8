//! Raspberry Pi backends: software-PWM H-bridge outputs and an
//! interrupt-driven quadrature counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};

use feeder_traits::Clock;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracing::trace;

use crate::encoder::{EncoderCfg, QuadratureEncoder, RawCounter};
use crate::error::{HwError, Result};
use crate::hbridge::{EnableLine, HBridge, HBridgeCfg, PwmChannel};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// BCM pin numbers for one feeder.
#[derive(Debug, Clone, Copy)]
pub struct GpioPins {
    pub drive1: u8,
    pub drive2: u8,
    pub peel1: u8,
    pub peel2: u8,
    pub enable: u8,
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub pwm_freq_hz: f64,
}

pub struct GpioPwm {
    pin: OutputPin,
    freq_hz: f64,
    duty: f32,
}

impl GpioPwm {
    pub fn new(mut pin: OutputPin, freq_hz: f64) -> Self {
        pin.set_low();
        Self {
            pin,
            freq_hz,
            duty: 0.0,
        }
    }
}

impl PwmChannel for GpioPwm {
    fn set_duty_percent(&mut self, duty: f32) -> Result<()> {
        let duty = duty.clamp(0.0, 100.0);
        if duty <= 0.0 {
            self.pin.clear_pwm().map_err(gpio_err)?;
            self.pin.set_low();
        } else if duty >= 100.0 {
            self.pin.clear_pwm().map_err(gpio_err)?;
            self.pin.set_high();
        } else {
            self.pin
                .set_pwm_frequency(self.freq_hz, f64::from(duty) / 100.0)
                .map_err(gpio_err)?;
        }
        self.duty = duty;
        Ok(())
    }

    fn duty_percent(&self) -> f32 {
        self.duty
    }
}

pub struct GpioEnable {
    pin: OutputPin,
}

impl GpioEnable {
    pub fn new(pin: OutputPin) -> Self {
        Self { pin }
    }
}

impl EnableLine for GpioEnable {
    fn set_active(&mut self, level_high: bool) -> Result<()> {
        if level_high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

// Gray-code step table indexed by (prev << 2) | next, +1/-1/0.
const QUAD_TABLE: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

#[derive(Default)]
struct QuadState {
    a: AtomicBool,
    b: AtomicBool,
    prev: AtomicU8,
    count: AtomicI64,
}

impl QuadState {
    fn edge(&self) {
        let next = (u8::from(self.a.load(Ordering::Acquire)) << 1)
            | u8::from(self.b.load(Ordering::Acquire));
        let prev = self.prev.swap(next, Ordering::AcqRel);
        let step = QUAD_TABLE[usize::from((prev << 2) | next)];
        if step != 0 {
            self.count.fetch_add(i64::from(step), Ordering::AcqRel);
        }
    }
}

/// Up/down counter fed by edge interrupts on both encoder channels.
pub struct GpioCounter {
    _a: InputPin,
    _b: InputPin,
    state: Arc<QuadState>,
    max_count: u32,
}

impl GpioCounter {
    pub fn new(mut a: InputPin, mut b: InputPin, max_count: u32) -> Result<Self> {
        let state = Arc::new(QuadState::default());
        state.a.store(a.is_high(), Ordering::Release);
        state.b.store(b.is_high(), Ordering::Release);
        state.edge();
        state.count.store(0, Ordering::Release);

        let sa = state.clone();
        a.set_async_interrupt(Trigger::Both, move |level: Level| {
            sa.a.store(level == Level::High, Ordering::Release);
            sa.edge();
        })
        .map_err(gpio_err)?;
        let sb = state.clone();
        b.set_async_interrupt(Trigger::Both, move |level: Level| {
            sb.b.store(level == Level::High, Ordering::Release);
            sb.edge();
        })
        .map_err(gpio_err)?;

        Ok(Self {
            _a: a,
            _b: b,
            state,
            max_count,
        })
    }
}

impl RawCounter for GpioCounter {
    fn read(&mut self) -> Result<u32> {
        let span = i64::from(self.max_count) + 1;
        let raw = self.state.count.load(Ordering::Acquire).rem_euclid(span) as u32;
        trace!(raw, "quadrature counter read");
        Ok(raw)
    }

    fn write(&mut self, value: u32) -> Result<()> {
        self.state.count.store(i64::from(value), Ordering::Release);
        Ok(())
    }
}

pub type GpioEncoder = QuadratureEncoder<GpioCounter>;
pub type GpioBridge = HBridge<GpioPwm, GpioEnable>;

/// Claim the feeder's pins and build its encoder and H-bridge.
pub fn gpio_feeder(
    pins: GpioPins,
    bridge: HBridgeCfg,
    encoder: EncoderCfg,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<(GpioEncoder, GpioBridge)> {
    let gpio = Gpio::new().map_err(gpio_err)?;
    let out = |n: u8| -> Result<OutputPin> { Ok(gpio.get(n).map_err(gpio_err)?.into_output()) };
    let inp = |n: u8| -> Result<InputPin> { Ok(gpio.get(n).map_err(gpio_err)?.into_input_pullup()) };

    let hbridge = HBridge::new(
        GpioPwm::new(out(pins.drive1)?, pins.pwm_freq_hz),
        GpioPwm::new(out(pins.drive2)?, pins.pwm_freq_hz),
        GpioPwm::new(out(pins.peel1)?, pins.pwm_freq_hz),
        GpioPwm::new(out(pins.peel2)?, pins.pwm_freq_hz),
        GpioEnable::new(out(pins.enable)?),
        bridge,
    )?;
    let counter = GpioCounter::new(inp(pins.encoder_a)?, inp(pins.encoder_b)?, encoder.max_count)?;
    let enc = QuadratureEncoder::new(counter, encoder, clock)?;
    tracing::info!(?pins, "gpio feeder claimed");
    Ok((enc, hbridge))
}
