//! Shared virtual-clock harness for the integration tests.
//!
//! The host side is a single `Rc<RefCell<..>>` cell that doubles as the
//! chip's timer service and pin port, so a test can drive the chip, run the
//! timer queue to quiescence and then inspect what happened.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use cc2520_core::regs::*;
use cc2520_core::{
    Cc2520, CcittCrc, EventScheduler, PinId, PinLevel, PinPort, TimerPurpose,
};

#[derive(Default)]
pub struct HostState {
    pub now_ms: f64,
    pub pending: Vec<(f64, TimerPurpose)>,
    pub pin_writes: Vec<(PinId, PinLevel)>,
}

#[derive(Clone, Default)]
pub struct SharedHost(pub Rc<RefCell<HostState>>);

impl EventScheduler for SharedHost {
    fn schedule_after_ms(&mut self, delay_ms: f64, purpose: TimerPurpose) {
        let mut host = self.0.borrow_mut();
        let deadline = host.now_ms + delay_ms;
        // One pending fire per purpose; rescheduling overwrites.
        host.pending.retain(|(_, pending)| *pending != purpose);
        host.pending.push((deadline, purpose));
    }
}

impl PinPort for SharedHost {
    fn set_pin_level(&mut self, pin: PinId, level: PinLevel) {
        self.0.borrow_mut().pin_writes.push((pin, level));
    }
}

pub struct Bench {
    pub chip: Cc2520,
    pub host: SharedHost,
}

impl Bench {
    pub fn new() -> Self {
        let host = SharedHost::default();
        let chip = Cc2520::new(Box::new(host.clone()), Box::new(host.clone()));
        Bench { chip, host }
    }

    /// Fire the earliest pending timer. Returns false when none is pending.
    pub fn step(&mut self) -> bool {
        let next = {
            let mut host = self.host.0.borrow_mut();
            let earliest = host
                .pending
                .iter()
                .enumerate()
                .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
                .map(|(i, _)| i);
            match earliest {
                Some(i) => {
                    let (deadline, purpose) = host.pending.remove(i);
                    if deadline > host.now_ms {
                        host.now_ms = deadline;
                    }
                    Some(purpose)
                }
                None => None,
            }
        };
        match next {
            Some(purpose) => {
                self.chip.timer_fired(purpose);
                true
            }
            None => false,
        }
    }

    /// Fire pending timers in deadline order until the queue drains.
    pub fn run(&mut self) {
        for _ in 0..100_000 {
            if !self.step() {
                return;
            }
        }
        panic!("timer queue did not drain");
    }

    /// VREG on, oscillator strobe, wait for IDLE.
    pub fn power_up(&mut self) {
        self.chip.set_vreg_on(true);
        self.run();
        self.strobe(INS_SXOSCON);
        self.run();
    }

    pub fn strobe(&mut self, op: u8) {
        self.chip.set_chip_select(true);
        self.chip.spi_exchange(op);
        self.chip.set_chip_select(false);
    }

    /// FREG register write over SPI (short-form instruction).
    pub fn spi_reg_write(&mut self, addr: u8, value: u8) {
        self.chip.set_chip_select(true);
        self.chip.spi_exchange(INS_REGWR | (addr & 0x3F));
        self.chip.spi_exchange(value);
        self.chip.set_chip_select(false);
    }

    pub fn spi_reg_read(&mut self, addr: u8) -> u8 {
        self.chip.set_chip_select(true);
        let value = self.chip.spi_exchange(INS_REGRD | (addr & 0x3F));
        self.chip.set_chip_select(false);
        value
    }

    pub fn spi_mem_write(&mut self, addr: u16, bytes: &[u8]) {
        self.chip.set_chip_select(true);
        self.chip.spi_exchange(INS_MEMWR | ((addr >> 8) as u8 & 0x0F));
        self.chip.spi_exchange((addr & 0xFF) as u8);
        for byte in bytes {
            self.chip.spi_exchange(*byte);
        }
        self.chip.set_chip_select(false);
    }

    pub fn spi_mem_read(&mut self, addr: u16, len: usize) -> Vec<u8> {
        self.chip.set_chip_select(true);
        self.chip.spi_exchange(INS_MEMRD | ((addr >> 8) as u8 & 0x0F));
        self.chip.spi_exchange((addr & 0xFF) as u8);
        let bytes = (0..len).map(|_| self.chip.spi_exchange(0)).collect();
        self.chip.set_chip_select(false);
        bytes
    }

    /// Drain `len` bytes from the RX FIFO with the RXBUF instruction.
    pub fn spi_rxbuf(&mut self, len: usize) -> Vec<u8> {
        self.chip.set_chip_select(true);
        self.chip.spi_exchange(INS_RXBUF);
        let bytes = (0..len).map(|_| self.chip.spi_exchange(0)).collect();
        self.chip.set_chip_select(false);
        bytes
    }

    /// Load a frame into the TX buffer with the TXBUF instruction.
    pub fn spi_txbuf(&mut self, bytes: &[u8]) {
        self.chip.set_chip_select(true);
        self.chip.spi_exchange(INS_TXBUF);
        for byte in bytes {
            self.chip.spi_exchange(*byte);
        }
        self.chip.set_chip_select(false);
    }

    /// Feed preamble, SFD byte and the frame bytes into the RX pipeline.
    pub fn receive_frame(&mut self, frame: &[u8]) {
        for _ in 0..5 {
            self.chip.air_byte_received(0x00);
        }
        self.chip.air_byte_received(0x7A);
        for byte in frame {
            self.chip.air_byte_received(*byte);
        }
    }

    /// Subscribe a byte sink to everything the chip puts on the air.
    pub fn capture_rf(&mut self) -> Rc<RefCell<Vec<u8>>> {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let tap = sink.clone();
        self.chip.add_rf_listener(move |byte| tap.borrow_mut().push(*byte));
        sink
    }
}

/// Build an on-air frame from the over-the-air payload (everything between
/// the length byte and the FCS): length byte, payload, then the two FCS
/// bytes the receiver will accept.
pub fn frame_with_fcs(payload: &[u8]) -> Vec<u8> {
    let mut crc = CcittCrc::new();
    for byte in payload {
        crc.add_bitrev(*byte);
    }
    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.push((payload.len() + 2) as u8);
    frame.extend_from_slice(payload);
    frame.push(crc.crc_hi());
    frame.push(crc.crc_lo());
    frame
}

/// A minimal data frame: FCF (data type, optional ack request), sequence
/// number, destination PAN and short address, no payload.
pub fn short_addressed_data_frame(
    ack_request: bool,
    seq: u8,
    pan: [u8; 2],
    dest: [u8; 2],
) -> Vec<u8> {
    let fcf0 = TYPE_DATA_FRAME | if ack_request { ACK_REQUEST } else { 0 };
    let fcf1 = SHORT_ADDRESS << 2;
    let payload = [fcf0, fcf1, seq, pan[0], pan[1], dest[0], dest[1]];
    frame_with_fcs(&payload)
}
