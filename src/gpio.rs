//! Signal pin routing: the chip drives four logical signals (FIFO, FIFOP,
//! SFD, CCA) onto externally-owned pins through the [`PinPort`] host trait.

use serde::Serialize;

/// Host-assigned identifier for one externally-owned pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PinId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinLevel {
    Low,
    High,
}

/// Pin access consumed from the host; the chip never owns pins itself.
pub trait PinPort {
    fn set_pin_level(&mut self, pin: PinId, level: PinLevel);
}

/// One of the six routable GPIO slots. Tracks the logical signal state and
/// the configured polarity; the physical level is high exactly when the
/// logical state equals the polarity.
#[derive(Debug, Clone)]
pub struct SignalPin {
    binding: Option<PinId>,
    polarity: bool,
    active: bool,
}

impl Default for SignalPin {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalPin {
    pub fn new() -> Self {
        Self {
            binding: None,
            polarity: true,
            active: false,
        }
    }

    pub fn bind(&mut self, pin: PinId) {
        self.binding = Some(pin);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn apply(&self, port: &mut dyn PinPort) {
        if let Some(pin) = self.binding {
            let level = if self.active == self.polarity {
                PinLevel::High
            } else {
                PinLevel::Low
            };
            port.set_pin_level(pin, level);
        }
    }

    /// Drive the logical signal. Idempotent: no pin write when unchanged.
    pub fn set_active(&mut self, port: &mut dyn PinPort, active: bool) {
        if self.active != active {
            self.active = active;
            self.apply(port);
        }
    }

    /// Reconfigure polarity, re-applying the current logical state so the
    /// physical level stays consistent.
    pub fn set_polarity(&mut self, port: &mut dyn PinPort, polarity: bool) {
        if self.polarity != polarity {
            self.polarity = polarity;
            self.apply(port);
        }
    }
}
