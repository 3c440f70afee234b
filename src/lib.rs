//! Instruction-level model of the CC2520 2.4 GHz IEEE 802.15.4 radio
//! transceiver for platform simulators.
//!
//! The model is passive and single-threaded: it owns no clock and spawns no
//! tasks. The host drives it through four entry points and everything else
//! follows from those calls:
//!
//! - [`Cc2520::spi_exchange`] for the byte-oriented command interface,
//! - [`Cc2520::air_byte_received`] for bytes arriving from the radio medium,
//! - [`Cc2520::set_chip_select`] / [`Cc2520::set_vreg_on`] for the control
//!   lines,
//! - [`Cc2520::timer_fired`] when a one-shot timer the chip scheduled
//!   through the host's [`EventScheduler`] comes due.
//!
//! Time is measured in milliseconds of simulated time; one modulation symbol
//! is [`SYMBOL_PERIOD_MS`] and every delay in the model is a whole number of
//! symbols.

mod chip;
mod crc;
mod fifo;
mod gpio;
mod listeners;
mod ram;
pub mod regs;
mod spi;
mod state;

pub use chip::{
    Cc2520, ChipInfo, ConfigChange, OperatingMode, CCA_THRESHOLD_DBM, NUM_GPIO_SLOTS,
    OSC_STARTUP_MS, RSSI_OFFSET, VREG_STARTUP_MS,
};
pub use crc::CcittCrc;
pub use fifo::ByteFifo;
pub use gpio::{PinId, PinLevel, PinPort};
pub use listeners::ListenerId;
pub use ram::{
    RadioRam, FRAME_BUFFER_LEN, RAM_IEEEADDR, RAM_PANID, RAM_RXFIFO, RAM_SHORTADDR, RAM_SIZE,
    RAM_TXFIFO,
};
pub use spi::{Instruction, PendingOp};
pub use state::RadioState;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("RAM address 0x{0:04x} out of range")]
    RamAddressOutOfRange(usize),
    #[error("register address 0x{0:02x} out of range")]
    RegisterOutOfRange(u8),
    #[error("invalid GPIO slot {0}, the chip has 6")]
    InvalidGpioSlot(usize),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Duration of one O-QPSK modulation symbol at 250 kbit/s; every internal
/// delay is a whole number of these.
pub const SYMBOL_PERIOD_MS: f64 = 0.016;

/// What a scheduled timer is for. The chip keeps at most one pending timer
/// per purpose: scheduling again replaces the previous deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    /// Crystal oscillator startup after SXOSCON.
    Oscillator,
    /// Voltage regulator startup after the VREG_EN line rises.
    VoltageRegulator,
    /// Next TX buffer byte is due on the air.
    FrameSend,
    /// Next acknowledgment byte is due on the air.
    AckSend,
    /// Next synchronization header byte is due on the air.
    ShrSend,
    /// Generic symbol-counted delay; interpreted against the current state.
    Symbol,
}

/// One-shot timer service the host must provide. Implementations replace any
/// pending timer with the same purpose and call
/// [`Cc2520::timer_fired`] once the deadline passes.
pub trait EventScheduler {
    fn schedule_after_ms(&mut self, delay_ms: f64, purpose: TimerPurpose);
}
