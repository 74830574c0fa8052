//! Hardware abstraction for peripheral drivers
//!
//! Blocks that touch hardware hold a driver handle acquired at initialize
//! and released at delete. Only the contract lives here; real OS adapters
//! implement these traits out of tree. The simulated provider lets the
//! runtime operate, and be tested, without any hardware attached.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Peripheral failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("pin {0} is unavailable")]
    Unavailable(u8),

    #[error("pin i/o failed: {0}")]
    Io(String),
}

/// A single digital GPIO pin. Reads and writes may block; the owning block
/// is single-threaded, so that is tolerated.
pub trait DigitalPin: Send {
    fn write(&mut self, level: bool) -> Result<(), PinError>;
    fn read(&mut self) -> Result<bool, PinError>;
}

/// Hands out owned pin handles. One owner per pin.
pub trait GpioProvider: Send + Sync {
    fn open_output(&self, pin: u8) -> Result<Box<dyn DigitalPin>, PinError>;
    fn open_input(&self, pin: u8) -> Result<Box<dyn DigitalPin>, PinError>;
}

// ── Simulated GPIO ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimPinState {
    level: Option<bool>,
    writes: Vec<bool>,
}

/// A simulated pin backed by shared in-memory state.
pub struct SimPin {
    state: Arc<Mutex<SimPinState>>,
}

impl DigitalPin for SimPin {
    fn write(&mut self, level: bool) -> Result<(), PinError> {
        let mut state = self.state.lock();
        state.level = Some(level);
        state.writes.push(level);
        Ok(())
    }

    fn read(&mut self) -> Result<bool, PinError> {
        Ok(self.state.lock().level.unwrap_or(false))
    }
}

/// Simulated GPIO provider. Every write is recorded per pin so callers can
/// assert on the exact side-effect sequence.
#[derive(Default)]
pub struct SimGpio {
    pins: Mutex<HashMap<u8, Arc<Mutex<SimPinState>>>>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn pin_state(&self, pin: u8) -> Arc<Mutex<SimPinState>> {
        self.pins.lock().entry(pin).or_default().clone()
    }

    /// Every level written to the pin, in order.
    pub fn writes(&self, pin: u8) -> Vec<bool> {
        self.pin_state(pin).lock().writes.clone()
    }

    /// The pin's current level, if anything has driven it.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.pin_state(pin).lock().level
    }

    /// Drive a pin from the outside (simulated field wiring).
    pub fn set_level(&self, pin: u8, level: bool) {
        self.pin_state(pin).lock().level = Some(level);
    }
}

impl GpioProvider for SimGpio {
    fn open_output(&self, pin: u8) -> Result<Box<dyn DigitalPin>, PinError> {
        Ok(Box::new(SimPin {
            state: self.pin_state(pin),
        }))
    }

    fn open_input(&self, pin: u8) -> Result<Box<dyn DigitalPin>, PinError> {
        Ok(Box::new(SimPin {
            state: self.pin_state(pin),
        }))
    }
}
