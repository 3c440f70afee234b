//! The CC2520 chip model: control state machine, receive/transmit pipelines,
//! auto-acknowledgment, SPI command execution and the simulator-facing API.
//!
//! The chip never runs on its own: every state change happens inside a call
//! from the host (an SPI transfer, an over-the-air byte, a control line) or
//! inside [`timer_fired`](Cc2520::timer_fired) when a previously scheduled
//! one-shot timer comes due.

use std::fmt;

use log::{debug, error, trace, warn};
use serde::Serialize;

use crate::crc::CcittCrc;
use crate::fifo::ByteFifo;
use crate::gpio::{PinId, PinPort, SignalPin};
use crate::listeners::{ListenerId, Listeners};
use crate::ram::{
    RadioRam, FRAME_BUFFER_LEN, RAM_IEEEADDR, RAM_PANID, RAM_RXFIFO, RAM_SHORTADDR, RAM_SIZE,
    RAM_TXFIFO,
};
use crate::regs::*;
use crate::spi::{Instruction, PendingOp, SpiSession};
use crate::state::RadioState;
use crate::{CoreError, EventScheduler, Result, TimerPurpose, SYMBOL_PERIOD_MS};

pub const NUM_GPIO_SLOTS: usize = 6;

/// Crystal startup time (datasheet p. 12).
pub const OSC_STARTUP_MS: f64 = 1.0;
/// Voltage regulator startup; kept short so timing-sensitive platform code
/// still sees a delay without slowing the simulation.
pub const VREG_STARTUP_MS: f64 = 0.05;

/// Offset between the raw RSSI register value and dBm (datasheet).
pub const RSSI_OFFSET: i32 = -45;
/// The channel is considered clear below this received power.
pub const CCA_THRESHOLD_DBM: i32 = -95;

const DEFAULT_CORR_VALUE: u8 = 37;
const DEFAULT_FIFOP_THRESHOLD: u8 = 0x40;
const SFD_BYTE: u8 = 0x7A;
const PREAMBLE_ZERO_BYTES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatingMode {
    TxRxOff,
    RxOn,
    TxRxOn,
    PowerOff,
}

impl OperatingMode {
    pub fn label(self) -> &'static str {
        match self {
            OperatingMode::TxRxOff => "off",
            OperatingMode::RxOn => "listen",
            OperatingMode::TxRxOn => "transmit",
            OperatingMode::PowerOff => "power_off",
        }
    }
}

/// Payload of a configuration-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigChange {
    pub addr: u8,
    pub old_value: u16,
    pub new_value: u16,
}

pub struct Cc2520 {
    scheduler: Box<dyn EventScheduler>,
    pins: Box<dyn PinPort>,

    state: RadioState,
    mode: OperatingMode,
    status: u8,
    registers: [u16; NUM_REGISTERS],
    ram: RadioRam,

    rx_fifo: ByteFifo,
    rx_crc: CcittCrc,
    rx_len: usize,
    rx_read: usize,
    zero_bytes: u32,
    overflow: bool,
    frame_rejected: bool,
    decode_address: bool,
    dest_addr_mode: u8,
    dsn: u8,
    fcf0: u8,
    fcf1: u8,
    frame_type: u8,
    crc_ok: bool,

    tx_cursor: usize,
    tx_flush_pending: bool,
    txfifo_pos: usize,
    shr: [u8; 5],
    shr_pos: usize,
    ack_buf: [u8; 6],
    ack_pos: usize,
    ack_frame_pending: bool,

    rssi: i32,
    corr_value: u8,
    cca: bool,
    fifop_threshold: u8,
    auto_ack: bool,
    should_ack: bool,
    address_decode: bool,
    ack_request: bool,
    auto_crc: bool,

    active_channel: i32,

    vreg_on: bool,
    chip_select: bool,
    spi: SpiSession,

    gpio: [SignalPin; NUM_GPIO_SLOTS],
    fifo_slot: usize,
    fifop_slot: usize,
    cca_slot: usize,
    sfd_slot: usize,

    state_listeners: Listeners<RadioState>,
    config_listeners: Listeners<ConfigChange>,
    channel_listeners: Listeners<i32>,
    rf_listeners: Listeners<u8>,
}

impl Cc2520 {
    pub fn new(scheduler: Box<dyn EventScheduler>, pins: Box<dyn PinPort>) -> Self {
        let mut chip = Self {
            scheduler,
            pins,
            state: RadioState::VregOff,
            mode: OperatingMode::PowerOff,
            status: 0,
            registers: [0; NUM_REGISTERS],
            ram: RadioRam::new(),
            rx_fifo: ByteFifo::new(RAM_RXFIFO, FRAME_BUFFER_LEN),
            rx_crc: CcittCrc::new(),
            rx_len: 0,
            rx_read: 0,
            zero_bytes: 0,
            overflow: false,
            frame_rejected: false,
            decode_address: false,
            dest_addr_mode: 0,
            dsn: 0,
            fcf0: 0,
            fcf1: 0,
            frame_type: 0,
            crc_ok: false,
            tx_cursor: 0,
            tx_flush_pending: false,
            txfifo_pos: 0,
            shr: [0; 5],
            shr_pos: 0,
            ack_buf: [0x05, 0x02, 0x00, 0x00, 0x00, 0x00],
            ack_pos: 0,
            ack_frame_pending: false,
            rssi: -100,
            corr_value: DEFAULT_CORR_VALUE,
            cca: false,
            fifop_threshold: DEFAULT_FIFOP_THRESHOLD,
            auto_ack: false,
            should_ack: false,
            address_decode: false,
            ack_request: false,
            auto_crc: false,
            active_channel: 0,
            vreg_on: false,
            chip_select: false,
            spi: SpiSession::default(),
            gpio: Default::default(),
            fifo_slot: 1,
            fifop_slot: 2,
            cca_slot: 3,
            sfd_slot: 4,
            state_listeners: Listeners::new(),
            config_listeners: Listeners::new(),
            channel_listeners: Listeners::new(),
            rf_listeners: Listeners::new(),
        };
        chip.registers[REG_FIFOPCTRL as usize] = DEFAULT_FIFOP_THRESHOLD as u16;
        chip.registers[REG_GPIOPOLARITY as usize] = POLARITY_MASK;
        chip.reset_wiring();
        chip
    }

    /// Restore the default signal routing and positive polarity.
    fn reset_wiring(&mut self) {
        self.registers[REG_RSSISTAT as usize] = 0;
        self.fifo_slot = 1;
        self.fifop_slot = 2;
        self.cca_slot = 3;
        self.sfd_slot = 4;
        let Self { gpio, pins, .. } = self;
        for pin in gpio.iter_mut() {
            pin.set_polarity(pins.as_mut(), true);
        }
    }

    // ---------------------------------------------------------------
    // Signal pins
    // ---------------------------------------------------------------

    fn drive_signal(&mut self, slot: usize, active: bool) {
        let Self { gpio, pins, .. } = self;
        gpio[slot].set_active(pins.as_mut(), active);
    }

    fn set_sfd(&mut self, active: bool) {
        trace!("SFD: {active}");
        let slot = self.sfd_slot;
        self.drive_signal(slot, active);
    }

    fn set_fifo(&mut self, active: bool) {
        trace!("FIFO: {active}");
        let slot = self.fifo_slot;
        self.drive_signal(slot, active);
    }

    fn set_fifop(&mut self, active: bool) {
        trace!("FIFOP: {active}");
        let slot = self.fifop_slot;
        self.drive_signal(slot, active);
    }

    fn set_cca_pin(&mut self, active: bool) {
        let slot = self.cca_slot;
        self.drive_signal(slot, active);
    }

    pub fn sfd_active(&self) -> bool {
        self.gpio[self.sfd_slot].is_active()
    }

    pub fn fifo_active(&self) -> bool {
        self.gpio[self.fifo_slot].is_active()
    }

    pub fn fifop_active(&self) -> bool {
        self.gpio[self.fifop_slot].is_active()
    }

    /// Bind one of the six GPIO slots to an externally-owned pin.
    pub fn set_gpio_binding(&mut self, slot: usize, pin: PinId) -> Result<()> {
        self.gpio
            .get_mut(slot)
            .ok_or(CoreError::InvalidGpioSlot(slot))?
            .bind(pin);
        Ok(())
    }

    // ---------------------------------------------------------------
    // State machine
    // ---------------------------------------------------------------

    pub fn state(&self) -> RadioState {
        self.state
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    fn set_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
    }

    fn set_symbol_timer(&mut self, symbols: u32) {
        self.scheduler
            .schedule_after_ms(SYMBOL_PERIOD_MS * symbols as f64, TimerPurpose::Symbol);
    }

    /// The single state mutator: updates the FSM status register, runs the
    /// state entry effects and notifies state listeners.
    fn set_state(&mut self, state: RadioState) {
        debug!("state transition {:?} -> {:?}", self.state, state);
        self.state = state;
        let fsmstat = self.registers[REG_FSMSTAT0 as usize];
        // The FSM field has no encoding for the powered-down states; their
        // negative codes report as 0 rather than truncating to 0x3E/0x3F.
        let code = state.fsm_code().max(0) as u16 & 0x3F;
        self.registers[REG_FSMSTAT0 as usize] = (fsmstat & !0x3F) | code;

        match state {
            RadioState::VregOff => {
                self.flush_rx();
                self.flush_tx();
                self.status &= !(STATUS_RSSI_VALID | STATUS_XOSC16M_STABLE);
                self.crc_ok = false;
                self.reset_wiring();
                self.set_mode(OperatingMode::PowerOff);
                self.update_cca();
            }
            RadioState::PowerDown => {
                self.rx_fifo.reset();
                self.status &= !(STATUS_RSSI_VALID | STATUS_XOSC16M_STABLE);
                self.crc_ok = false;
                self.reset_wiring();
                self.set_mode(OperatingMode::PowerOff);
                self.update_cca();
            }
            RadioState::RxCalibrate => {
                self.set_symbol_timer(12);
                self.set_mode(OperatingMode::RxOn);
            }
            RadioState::RxSfdSearch => {
                self.zero_bytes = 0;
                // RSSI becomes valid eight symbols after the search starts.
                if self.status & STATUS_RSSI_VALID == 0 {
                    self.set_symbol_timer(8);
                }
                self.update_cca();
                self.set_mode(OperatingMode::RxOn);
            }
            RadioState::TxCalibrate => {
                // 12 symbols calibration plus one byte time before the first
                // byte reaches the listener.
                self.set_symbol_timer(12 + 2);
                self.set_mode(OperatingMode::TxRxOn);
            }
            RadioState::TxPreamble | RadioState::TxAckPreamble => {
                self.shr_pos = 0;
                self.shr = [0, 0, 0, 0, SFD_BYTE];
                self.shr_next();
            }
            RadioState::TxFrame => {
                self.txfifo_pos = 0;
                // A local transmission must not satisfy a later SACK as if a
                // valid frame had just been received.
                self.crc_ok = false;
                self.tx_next();
            }
            RadioState::RxWait => {
                self.set_symbol_timer(8);
                self.set_mode(OperatingMode::RxOn);
            }
            RadioState::Idle => {
                self.status &= !STATUS_RSSI_VALID;
                self.registers[REG_RSSISTAT as usize] = 0;
                self.set_mode(OperatingMode::TxRxOff);
                self.update_cca();
            }
            RadioState::TxAckCalibrate => {
                // The SFD of a fully received packet is not re-synchronized,
                // so two guard symbols and two compensation symbols are added
                // to the nominal 12-symbol calibration.
                self.status |= STATUS_TX_ACTIVE;
                self.set_symbol_timer(12 + 2 + 2);
                self.set_mode(OperatingMode::TxRxOn);
            }
            RadioState::TxAck => {
                self.ack_pos = 0;
                self.crc_ok = false;
                self.ack_next();
            }
            RadioState::RxFrame => {
                // Remember where the frame starts so an address mismatch can
                // drop it atomically.
                self.rx_fifo.mark();
                self.rx_read = 0;
                self.frame_rejected = false;
                self.should_ack = false;
                self.crc_ok = false;
            }
            RadioState::RxOverflow | RadioState::TxUnderflow => {}
        }

        let state = self.state;
        self.state_listeners.emit(&state);
    }

    // ---------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------

    /// Host callback when a previously scheduled one-shot timer comes due.
    /// Every purpose re-checks the current state: a timer may outlive the
    /// situation it was scheduled for.
    pub fn timer_fired(&mut self, purpose: TimerPurpose) {
        match purpose {
            TimerPurpose::VoltageRegulator => {
                debug!("voltage regulator stable");
                self.vreg_on = true;
                self.set_state(RadioState::PowerDown);
                self.update_cca();
            }
            TimerPurpose::Oscillator => {
                if !self.vreg_on {
                    return;
                }
                debug!("oscillator stable");
                self.status |= STATUS_XOSC16M_STABLE;
                self.set_state(RadioState::Idle);
            }
            TimerPurpose::FrameSend => self.tx_next(),
            TimerPurpose::AckSend => self.ack_next(),
            TimerPurpose::ShrSend => self.shr_next(),
            TimerPurpose::Symbol => match self.state {
                RadioState::RxCalibrate => self.set_state(RadioState::RxSfdSearch),
                RadioState::RxSfdSearch => {
                    // Eight symbols after the first SFD search: RSSI valid.
                    self.status |= STATUS_RSSI_VALID;
                    self.registers[REG_RSSISTAT as usize] = 1;
                    self.update_cca();
                }
                RadioState::TxCalibrate => self.set_state(RadioState::TxPreamble),
                RadioState::RxWait => self.set_state(RadioState::RxSfdSearch),
                RadioState::TxAckCalibrate => self.set_state(RadioState::TxAckPreamble),
                _ => {}
            },
        }
    }

    // ---------------------------------------------------------------
    // Receive pipeline
    // ---------------------------------------------------------------

    /// One byte received from the radio medium.
    pub fn air_byte_received(&mut self, data: u8) {
        trace!(
            "air byte 0x{data:02x} in {:?} (zeroes: {})",
            self.state,
            self.zero_bytes
        );
        match self.state {
            RadioState::RxSfdSearch => {
                if data == 0 {
                    self.zero_bytes += 1;
                } else if self.zero_bytes >= PREAMBLE_ZERO_BYTES && data == SFD_BYTE {
                    // Four zero bytes followed by the SFD byte: synchronized.
                    self.set_sfd(true);
                    debug!("RX: preamble/SFD synchronized");
                    self.set_state(RadioState::RxFrame);
                } else {
                    // No partial credit for an interrupted preamble.
                    self.zero_bytes = 0;
                }
            }
            RadioState::RxFrame => self.rx_frame_byte(data),
            _ => {}
        }
    }

    fn rx_frame_byte(&mut self, data: u8) {
        if self.overflow {
            // Overflowed FIFO needs an explicit flush before receiving again.
            return;
        }
        if self.rx_fifo.is_full() {
            self.set_rx_overflow();
            return;
        }

        if !self.frame_rejected {
            self.rx_fifo.write(&mut self.ram, data);
            if self.rx_read == 0 {
                self.rx_crc.set(0);
                self.rx_len = data as usize;
                self.decode_address = self.address_decode;
                debug!("RX: start frame, length {}", self.rx_len);
                // FIFO goes high once the length byte lands in the FIFO.
                self.set_fifo(true);
            } else if self.rx_read + 1 < self.rx_len {
                // Everything between the length byte and the FCS counts
                // towards the CRC.
                self.rx_crc.add_bitrev(data);
                if self.rx_read == 1 {
                    self.fcf0 = data;
                    self.frame_type = self.fcf0 & FRAME_TYPE;
                } else if self.rx_read == 2 {
                    self.fcf1 = data;
                    if self.frame_type == TYPE_DATA_FRAME {
                        self.ack_request = self.fcf0 & ACK_REQUEST != 0;
                        self.dest_addr_mode = (self.fcf1 >> 2) & 3;
                        if self.address_decode
                            && self.dest_addr_mode != LONG_ADDRESS
                            && self.dest_addr_mode != SHORT_ADDRESS
                        {
                            self.reject_frame();
                        }
                    } else if self.frame_type == TYPE_BEACON_FRAME
                        || self.frame_type == TYPE_ACK_FRAME
                    {
                        self.decode_address = false;
                        self.ack_request = false;
                    } else if self.address_decode {
                        self.reject_frame();
                    }
                } else if self.rx_read == 3 {
                    self.dsn = data;
                } else if self.decode_address {
                    let mut reject = false;
                    if self.dest_addr_mode == LONG_ADDRESS && self.rx_read == 8 + 5 {
                        reject = !self.rx_fifo.tail_equals_ram(&self.ram, RAM_IEEEADDR, 8, 0);
                        reject |= !self.rx_fifo.tail_equals_ram(&self.ram, RAM_PANID, 2, 8)
                            && !self.rx_fifo.tail_equals(&self.ram, &BROADCAST_ADDRESS, 8);
                        self.decode_address = false;
                    } else if self.dest_addr_mode == SHORT_ADDRESS && self.rx_read == 2 + 5 {
                        reject = !self.rx_fifo.tail_equals(&self.ram, &BROADCAST_ADDRESS, 0)
                            && !self.rx_fifo.tail_equals_ram(&self.ram, RAM_SHORTADDR, 2, 0);
                        reject |= !self.rx_fifo.tail_equals_ram(&self.ram, RAM_PANID, 2, 2)
                            && !self.rx_fifo.tail_equals(&self.ram, &BROADCAST_ADDRESS, 2);
                        self.decode_address = false;
                    }
                    if reject {
                        self.reject_frame();
                    }
                }
            }

            // FIFOP asserts for the first buffered frame only, once the fill
            // level passes the threshold and address recognition is done.
            if !self.fifop_active()
                && self.rx_fifo.len() <= self.rx_len + 1
                && !self.decode_address
                && !self.frame_rejected
                && self.rx_fifo.len() > self.fifop_threshold as usize
            {
                debug!("RX: FIFOP threshold reached");
                self.set_fifop(true);
            }
        }

        let frame_done = self.rx_read == self.rx_len;
        self.rx_read += 1;
        if frame_done {
            self.rx_frame_completed();
        }
    }

    fn rx_frame_completed(&mut self) {
        if self.frame_rejected {
            debug!("RX: rejected frame discarded");
            self.set_sfd(false);
            self.set_state(RadioState::RxWait);
            return;
        }

        let received_crc = ((self.rx_fifo.get(&self.ram, -2) as u16) << 8)
            | self.rx_fifo.get(&self.ram, -1) as u16;
        self.crc_ok = received_crc == self.rx_crc.crc_bitrev();
        if !self.crc_ok {
            debug!(
                "RX: bad FCS, received 0x{received_crc:04x} computed 0x{:04x}",
                self.rx_crc.crc_bitrev()
            );
        }
        // The FCS bytes are replaced in the FIFO by RSSI and the correlation
        // value with the CRC result in the top bit.
        let rssi_byte = (self.registers[REG_RSSI as usize] & 0xFF) as u8;
        self.rx_fifo.set(&mut self.ram, -2, rssi_byte);
        let corr = (self.corr_value & 0x7F) | if self.crc_ok { 0x80 } else { 0 };
        self.rx_fifo.set(&mut self.ram, -1, corr);

        // FIFOP only for the first buffered frame.
        if self.rx_fifo.len() <= self.rx_len + 1 {
            self.set_fifop(true);
        }
        self.set_sfd(false);

        if ((self.auto_ack && self.ack_request) || self.should_ack) && self.crc_ok {
            self.set_state(RadioState::TxAckCalibrate);
        } else {
            self.set_state(RadioState::RxWait);
        }
    }

    /// Roll the FIFO back to the frame start and ignore the rest of the
    /// frame. The radio still counts bytes until the declared length so it
    /// re-synchronizes at the frame boundary.
    fn reject_frame(&mut self) {
        self.rx_fifo.restore();
        self.set_sfd(false);
        let fifo = self.rx_fifo.len() > 0;
        self.set_fifo(fifo);
        self.frame_rejected = true;
    }

    fn set_rx_overflow(&mut self) {
        debug!("RX FIFO overflow");
        self.set_fifop(true);
        self.set_fifo(false);
        self.set_sfd(false);
        self.overflow = true;
        self.should_ack = false;
        self.set_state(RadioState::RxOverflow);
    }

    // ---------------------------------------------------------------
    // Transmit pipelines
    // ---------------------------------------------------------------

    /// Emit the next synchronization header byte, or hand over to the frame
    /// or acknowledgment pipeline when the header is out.
    fn shr_next(&mut self) {
        if !matches!(
            self.state,
            RadioState::TxPreamble | RadioState::TxAckPreamble
        ) {
            error!(
                "sync header timer fired in {:?}; transmission abandoned",
                self.state
            );
            return;
        }
        if self.shr_pos == self.shr.len() {
            self.set_sfd(true);
            if self.state == RadioState::TxPreamble {
                self.set_state(RadioState::TxFrame);
            } else {
                self.set_state(RadioState::TxAck);
            }
        } else {
            let byte = self.shr[self.shr_pos];
            trace!("TX SHR byte 0x{byte:02x}");
            self.rf_listeners.emit(&byte);
            self.shr_pos += 1;
            self.scheduler
                .schedule_after_ms(SYMBOL_PERIOD_MS * 2.0, TimerPurpose::ShrSend);
        }
    }

    /// Emit the next TX buffer byte, patching the FCS into the buffer one
    /// byte-time before it is due on the air.
    fn tx_next(&mut self) {
        if self.state != RadioState::TxFrame {
            warn!("frame send timer fired in {:?}; ignored", self.state);
            return;
        }
        let len = self.ram.read(RAM_TXFIFO) as usize;
        if self.txfifo_pos <= len {
            if self.txfifo_pos + 1 == len {
                let mut crc = CcittCrc::new();
                for i in 1..len - 1 {
                    crc.add_bitrev(self.ram.read(RAM_TXFIFO + i));
                }
                self.ram.write(RAM_TXFIFO + len - 1, crc.crc_hi());
                self.ram.write(RAM_TXFIFO + len, crc.crc_lo());
            }
            if self.txfifo_pos > 0x7F {
                warn!(
                    "TX frame longer than the buffer; repeating bytes from position {}",
                    self.txfifo_pos
                );
            }
            let byte = self.ram.read(RAM_TXFIFO + (self.txfifo_pos & 0x7F));
            trace!("TX byte 0x{byte:02x}");
            self.rf_listeners.emit(&byte);
            self.txfifo_pos += 1;
            // One byte every two symbol periods.
            self.scheduler
                .schedule_after_ms(SYMBOL_PERIOD_MS * 2.0, TimerPurpose::FrameSend);
        } else {
            debug!("TX complete");
            self.status &= !STATUS_TX_ACTIVE;
            self.set_sfd(false);
            if self.overflow {
                self.set_state(RadioState::RxOverflow);
            } else {
                self.set_state(RadioState::RxCalibrate);
            }
            self.set_mode(OperatingMode::RxOn);
            self.tx_flush_pending = true;
        }
    }

    /// Emit the next acknowledgment byte; the template is patched with the
    /// frame-pending bit and the received sequence number on the first byte.
    fn ack_next(&mut self) {
        if self.state != RadioState::TxAck {
            warn!("ack send timer fired in {:?}; ignored", self.state);
            return;
        }
        if self.ack_pos < self.ack_buf.len() {
            if self.ack_pos == 0 {
                if self.ack_frame_pending {
                    self.ack_buf[1] |= FRAME_PENDING;
                } else {
                    self.ack_buf[1] &= !FRAME_PENDING;
                }
                self.ack_buf[ACK_SEQPOS] = self.dsn;
                let mut crc = CcittCrc::new();
                for i in 1..4 {
                    crc.add_bitrev(self.ack_buf[i]);
                }
                self.ack_buf[4] = crc.crc_hi();
                self.ack_buf[5] = crc.crc_lo();
            }
            let byte = self.ack_buf[self.ack_pos];
            trace!("TX ack byte 0x{byte:02x}");
            self.rf_listeners.emit(&byte);
            self.ack_pos += 1;
            self.scheduler
                .schedule_after_ms(SYMBOL_PERIOD_MS * 2.0, TimerPurpose::AckSend);
        } else {
            debug!("TX ack complete");
            self.status &= !STATUS_TX_ACTIVE;
            self.set_sfd(false);
            self.set_state(RadioState::RxCalibrate);
            self.set_mode(OperatingMode::RxOn);
        }
    }

    fn write_tx_fifo(&mut self, data: u8) {
        if self.tx_flush_pending {
            self.tx_cursor = 0;
            self.tx_flush_pending = false;
        }
        if self.tx_cursor == 0 {
            if data as usize > FRAME_BUFFER_LEN - 1 {
                warn!("TX frame length {} exceeds the buffer", data);
            }
        } else if self.tx_cursor > FRAME_BUFFER_LEN - 1 {
            warn!("TX cursor wrapped");
            self.tx_cursor = 0;
        }
        self.ram.write(RAM_TXFIFO + self.tx_cursor, data);
        self.tx_cursor += 1;
    }

    fn flush_rx(&mut self) {
        debug!("flushing RX FIFO, length {}", self.rx_fifo.len());
        self.rx_fifo.reset();
        self.set_sfd(false);
        self.set_fifop(false);
        self.set_fifo(false);
        self.overflow = false;
        if self.state.is_rx() {
            self.set_state(RadioState::RxSfdSearch);
        }
    }

    fn flush_tx(&mut self) {
        self.tx_cursor = 0;
    }

    // ---------------------------------------------------------------
    // Strobes
    // ---------------------------------------------------------------

    fn strobe(&mut self, op: u8) {
        debug!("strobe 0x{op:02x} in {:?}", self.state);
        if self.state == RadioState::PowerDown && op != INS_SXOSCON {
            debug!("strobe ignored in POWER_DOWN");
            return;
        }
        match op {
            INS_SNOP => {}
            INS_SRXON => {
                if self.state == RadioState::Idle {
                    self.set_state(RadioState::RxCalibrate);
                } else {
                    debug!("SRXON outside IDLE ignored");
                }
            }
            INS_SRFOFF => {
                if self.state.frame_in_progress() {
                    warn!("RX/TX turned off while a frame is in progress");
                }
                self.set_state(RadioState::Idle);
            }
            INS_STXON => {
                if self.state == RadioState::Idle || self.state.is_rx() {
                    self.status |= STATUS_TX_ACTIVE;
                    self.set_state(RadioState::TxCalibrate);
                }
            }
            INS_STXONCCA => {
                // CCA needs active reception to be meaningful, so this is
                // only honored from the RX states.
                if self.state.is_rx() {
                    if self.cca {
                        self.status |= STATUS_TX_ACTIVE;
                        self.set_state(RadioState::TxCalibrate);
                    } else {
                        debug!("STXONCCA ignored, channel not clear");
                    }
                }
            }
            INS_SFLUSHRX => self.flush_rx(),
            INS_SFLUSHTX => self.flush_tx(),
            INS_SXOSCON => {
                self.scheduler
                    .schedule_after_ms(OSC_STARTUP_MS, TimerPurpose::Oscillator);
            }
            INS_SXOSCOFF => {
                self.status &= !STATUS_XOSC16M_STABLE;
                self.set_state(RadioState::PowerDown);
                self.set_fifop(false);
            }
            INS_SACK | INS_SACKPEND => {
                // Frame-pending intent sticks for every following ack.
                self.ack_frame_pending = op == INS_SACKPEND;
                if self.state == RadioState::RxFrame {
                    self.should_ack = true;
                } else if self.crc_ok {
                    self.set_state(RadioState::TxAckCalibrate);
                }
            }
            _ => warn!("unknown strobe 0x{op:02x} ignored"),
        }
    }

    // ---------------------------------------------------------------
    // SPI transport
    // ---------------------------------------------------------------

    /// Full-duplex SPI byte exchange: consume one byte, return the reply
    /// shifted out during the same transfer.
    pub fn spi_exchange(&mut self, data: u8) -> u8 {
        if !self.chip_select {
            return 0;
        }
        if self.state == RadioState::VregOff {
            warn!("SPI transfer while the voltage regulator is off");
            return 0;
        }
        let status = self.status;
        match self.spi.op.take() {
            None => self.start_instruction(data, status),
            Some(PendingOp::RegWrite { addr }) => {
                self.write_register_hooked(addr, data as u16);
                status
            }
            Some(PendingOp::MemAddress { write, high }) => {
                let addr = ((high as u16) << 8) | data as u16;
                self.spi.op = Some(if write {
                    PendingOp::MemWrite { addr }
                } else {
                    PendingOp::MemRead { addr }
                });
                status
            }
            Some(PendingOp::MemRead { addr }) => {
                let value = self.read_memory(addr);
                self.spi.op = Some(PendingOp::MemRead {
                    addr: (addr + 1) & (RAM_SIZE as u16 - 1),
                });
                value
            }
            Some(PendingOp::MemWrite { addr }) => {
                self.write_memory(addr, data);
                self.spi.op = Some(PendingOp::MemWrite {
                    addr: (addr + 1) & (RAM_SIZE as u16 - 1),
                });
                status
            }
            Some(PendingOp::RxBuf) => {
                self.spi.op = Some(PendingOp::RxBuf);
                self.read_rx_fifo()
            }
            Some(PendingOp::TxBuf) => {
                self.spi.op = Some(PendingOp::TxBuf);
                self.write_tx_fifo(data);
                status
            }
        }
    }

    fn start_instruction(&mut self, data: u8, status: u8) -> u8 {
        match Instruction::decode(data) {
            Instruction::RegRead(addr) => (self.registers[addr as usize] & 0xFF) as u8,
            Instruction::RegWrite(addr) => {
                self.spi.op = Some(PendingOp::RegWrite { addr });
                status
            }
            Instruction::MemRead(high) => {
                self.spi.op = Some(PendingOp::MemAddress { write: false, high });
                status
            }
            Instruction::MemWrite(high) => {
                self.spi.op = Some(PendingOp::MemAddress { write: true, high });
                status
            }
            Instruction::RxBuf => {
                self.spi.op = Some(PendingOp::RxBuf);
                status
            }
            Instruction::TxBuf => {
                self.spi.op = Some(PendingOp::TxBuf);
                status
            }
            Instruction::Strobe(op) => {
                self.strobe(op);
                status
            }
            Instruction::Stub(op) => {
                debug!("instruction 0x{op:02x} not implemented, accepted as no-op");
                status
            }
            Instruction::Unknown(op) => {
                warn!("unknown SPI instruction 0x{op:02x}");
                status
            }
        }
    }

    /// Pop one byte for the RXBUF instruction, tracking the FIFO signals.
    fn read_rx_fifo(&mut self) -> u8 {
        let value = self.rx_fifo.read(&self.ram).unwrap_or(0);
        let remaining = self.rx_fifo.len();
        self.set_fifo(remaining > 0);
        if remaining == 0 {
            self.set_fifop(false);
        }
        value
    }

    fn read_memory(&self, addr: u16) -> u8 {
        let addr = addr as usize & (RAM_SIZE - 1);
        if addr < NUM_REGISTERS {
            (self.registers[addr] & 0xFF) as u8
        } else {
            self.ram.read(addr)
        }
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        let addr = addr as usize & (RAM_SIZE - 1);
        if addr < NUM_REGISTERS {
            self.write_register_hooked(addr as u8, value as u16);
        } else {
            self.ram.write(addr, value);
        }
    }

    /// Register write on the command path: runs the configuration hooks and
    /// fires the configuration-change notification exactly once.
    fn write_register_hooked(&mut self, addr: u8, value: u16) {
        let addr = addr & 0x7F;
        let old_value = self.registers[addr as usize];
        self.registers[addr as usize] = value;
        match addr {
            REG_FIFOPCTRL => {
                self.fifop_threshold = (value & FIFOP_THR_MASK) as u8;
            }
            REG_GPIOPOLARITY => {
                if old_value != value {
                    self.apply_polarity(value);
                }
            }
            REG_MDMCTRL0 => {
                self.address_decode = value & ADR_DECODE != 0;
                self.auto_crc = value & ADR_AUTOCRC != 0;
                self.auto_ack = value & AUTOACK != 0;
            }
            REG_FSCTRL => {
                let old_channel = self.active_channel;
                self.active_channel = Self::frequency_of(value).1;
                if old_channel != self.active_channel && !self.channel_listeners.is_empty() {
                    let channel = self.active_channel;
                    self.channel_listeners.emit(&channel);
                }
            }
            _ => {}
        }
        let change = ConfigChange {
            addr,
            old_value,
            new_value: value,
        };
        self.config_listeners.emit(&change);
    }

    fn apply_polarity(&mut self, value: u16) {
        let fifo = value & FIFO_POLARITY != 0;
        let fifop = value & FIFOP_POLARITY != 0;
        let sfd = value & SFD_POLARITY != 0;
        let cca = value & CCA_POLARITY != 0;
        let (fifo_slot, fifop_slot, sfd_slot, cca_slot) =
            (self.fifo_slot, self.fifop_slot, self.sfd_slot, self.cca_slot);
        let Self { gpio, pins, .. } = self;
        gpio[fifo_slot].set_polarity(pins.as_mut(), fifo);
        gpio[fifop_slot].set_polarity(pins.as_mut(), fifop);
        gpio[sfd_slot].set_polarity(pins.as_mut(), sfd);
        gpio[cca_slot].set_polarity(pins.as_mut(), cca);
    }

    // ---------------------------------------------------------------
    // Control lines
    // ---------------------------------------------------------------

    pub fn set_chip_select(&mut self, select: bool) {
        self.chip_select = select;
        if !select {
            // Whatever was in flight is abandoned.
            self.spi.reset();
        }
        trace!("chip select: {select}");
    }

    pub fn chip_select(&self) -> bool {
        self.chip_select
    }

    pub fn set_vreg_on(&mut self, on: bool) {
        if self.vreg_on == on {
            return;
        }
        if on {
            self.scheduler
                .schedule_after_ms(VREG_STARTUP_MS, TimerPurpose::VoltageRegulator);
        } else {
            self.vreg_on = false;
            self.set_state(RadioState::VregOff);
        }
    }

    pub fn vreg_on(&self) -> bool {
        self.vreg_on
    }

    // ---------------------------------------------------------------
    // Ambient radio environment
    // ---------------------------------------------------------------

    fn update_cca(&mut self) {
        let cca = self.status & STATUS_RSSI_VALID != 0 && self.rssi < CCA_THRESHOLD_DBM;
        if cca != self.cca {
            self.cca = cca;
            debug!("CCA: {cca}");
            self.set_cca_pin(cca);
        }
    }

    pub fn cca(&self) -> bool {
        self.cca
    }

    /// Externally simulated received signal strength in dBm.
    pub fn set_rssi(&mut self, power_dbm: i32) {
        let power = power_dbm.clamp(-128 + RSSI_OFFSET, 127 + RSSI_OFFSET);
        self.rssi = power;
        self.registers[REG_RSSI as usize] = ((power - RSSI_OFFSET) & 0xFF) as u16;
        self.update_cca();
    }

    pub fn rssi(&self) -> i32 {
        self.rssi
    }

    /// Externally simulated link quality (the CORR value, 7 bits).
    pub fn set_lqi(&mut self, lqi: u8) {
        self.corr_value = lqi.min(0x7F);
    }

    pub fn lqi(&self) -> u8 {
        self.corr_value
    }

    // ---------------------------------------------------------------
    // Derived configuration
    // ---------------------------------------------------------------

    fn frequency_of(fsctrl: u16) -> (i32, i32) {
        let reg = fsctrl as i32;
        // Inverse of f = 5 * (channel - 11) + 357 + 0x4000.
        let frequency = reg - 357 + 2405 - 0x4000;
        let channel = (reg - 357 - 0x4000) / 5 + 11;
        (frequency, channel)
    }

    pub fn active_frequency(&self) -> i32 {
        Self::frequency_of(self.registers[REG_FSCTRL as usize]).0
    }

    pub fn active_channel(&self) -> i32 {
        Self::frequency_of(self.registers[REG_FSCTRL as usize]).1
    }

    pub fn output_power_indicator(&self) -> u8 {
        (self.registers[REG_TXPOWER as usize] & 0x1F) as u8
    }

    /// Output power in dBm: the datasheet table 17 values first, then coarse
    /// bands for non-canonical settings, -100 when nothing matches.
    pub fn output_power_dbm(&self) -> i32 {
        match (self.registers[REG_TXPOWER as usize] & 0xFF) as u8 {
            0xF7 => return 5,
            0xF2 => return 3,
            0xAB => return 2,
            0x13 => return 1,
            0x32 => return 0,
            0x81 => return -2,
            0x88 => return -4,
            0x2C => return -7,
            0x03 => return -18,
            _ => {}
        }
        let indicator = self.output_power_indicator();
        if indicator >= 31 {
            0
        } else if indicator >= 27 {
            -1
        } else if indicator >= 23 {
            -3
        } else if indicator >= 19 {
            -5
        } else if indicator >= 15 {
            -7
        } else if indicator >= 11 {
            -10
        } else if indicator >= 7 {
            -15
        } else if indicator >= 3 {
            -25
        } else {
            -100
        }
    }

    // ---------------------------------------------------------------
    // Raw host access
    // ---------------------------------------------------------------

    /// Raw register read; no side effects.
    pub fn register(&self, addr: u8) -> Result<u16> {
        self.registers
            .get(addr as usize)
            .copied()
            .ok_or(CoreError::RegisterOutOfRange(addr))
    }

    /// Raw register write; configuration hooks are not replayed.
    pub fn set_register(&mut self, addr: u8, value: u16) -> Result<()> {
        match self.registers.get_mut(addr as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CoreError::RegisterOutOfRange(addr)),
        }
    }

    /// Host-side register write with the full 16-bit value. Runs the same
    /// configuration hooks as a write arriving over SPI; this is the only
    /// way to reach configuration bits above the 8-bit SPI data byte, such
    /// as the address-filtering bit of MDMCTRL0 or the upper GPIOPOLARITY
    /// bits.
    pub fn write_register(&mut self, addr: u8, value: u16) -> Result<()> {
        if addr as usize >= NUM_REGISTERS {
            return Err(CoreError::RegisterOutOfRange(addr));
        }
        self.write_register_hooked(addr, value);
        Ok(())
    }

    pub fn ram_byte(&self, addr: usize) -> Result<u8> {
        self.ram.try_read(addr)
    }

    pub fn set_ram_byte(&mut self, addr: usize, value: u8) -> Result<()> {
        self.ram.try_write(addr, value)
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.rx_fifo.len()
    }

    pub fn last_crc_ok(&self) -> bool {
        self.crc_ok
    }

    pub fn status_byte(&self) -> u8 {
        self.status
    }

    // ---------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------

    pub fn add_state_listener(
        &mut self,
        listener: impl FnMut(&RadioState) + 'static,
    ) -> ListenerId {
        self.state_listeners.add(listener)
    }

    pub fn remove_state_listener(&mut self, id: ListenerId) -> bool {
        self.state_listeners.remove(id)
    }

    pub fn add_config_listener(
        &mut self,
        listener: impl FnMut(&ConfigChange) + 'static,
    ) -> ListenerId {
        self.config_listeners.add(listener)
    }

    pub fn remove_config_listener(&mut self, id: ListenerId) -> bool {
        self.config_listeners.remove(id)
    }

    pub fn add_channel_listener(&mut self, listener: impl FnMut(&i32) + 'static) -> ListenerId {
        self.channel_listeners.add(listener)
    }

    pub fn remove_channel_listener(&mut self, id: ListenerId) -> bool {
        self.channel_listeners.remove(id)
    }

    /// Subscribe to every byte the chip puts on the air.
    pub fn add_rf_listener(&mut self, listener: impl FnMut(&u8) + 'static) -> ListenerId {
        self.rf_listeners.add(listener)
    }

    pub fn remove_rf_listener(&mut self, id: ListenerId) -> bool {
        self.rf_listeners.remove(id)
    }

    // ---------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------

    pub fn info(&self) -> ChipInfo {
        let (frequency, channel) = Self::frequency_of(self.registers[REG_FSCTRL as usize]);
        let pan_id = self.ram.read(RAM_PANID) as u16 | ((self.ram.read(RAM_PANID + 1) as u16) << 8);
        let short_address = self.ram.read(RAM_SHORTADDR) as u16
            | ((self.ram.read(RAM_SHORTADDR + 1) as u16) << 8);
        let mut long_address = String::new();
        for i in 0..8 {
            if i % 2 == 0 && i > 0 {
                long_address.push(':');
            }
            long_address.push_str(&format!("{:02x}", self.ram.read(RAM_IEEEADDR + 7 - i)));
        }
        ChipInfo {
            vreg_on: self.vreg_on,
            chip_select: self.chip_select,
            osc_stable: self.status & STATUS_XOSC16M_STABLE != 0,
            rssi_valid: self.status & STATUS_RSSI_VALID != 0,
            cca: self.cca,
            fifo: self.fifo_active(),
            fifop: self.fifop_active(),
            sfd: self.sfd_active(),
            state: self.state,
            spi_command: self.spi.op.as_ref().map(|op| op.describe()),
            auto_ack: self.auto_ack,
            address_decode: self.address_decode,
            auto_crc: self.auto_crc,
            pan_id,
            short_address,
            long_address,
            channel,
            frequency,
            fifop_threshold: self.fifop_threshold,
            rx_fifo_len: self.rx_fifo.len(),
            expected_frame_len: self.rx_len,
        }
    }
}

/// Point-in-time diagnostic snapshot of the whole chip.
#[derive(Debug, Clone, Serialize)]
pub struct ChipInfo {
    pub vreg_on: bool,
    pub chip_select: bool,
    pub osc_stable: bool,
    pub rssi_valid: bool,
    pub cca: bool,
    pub fifo: bool,
    pub fifop: bool,
    pub sfd: bool,
    pub state: RadioState,
    pub spi_command: Option<&'static str>,
    pub auto_ack: bool,
    pub address_decode: bool,
    pub auto_crc: bool,
    pub pan_id: u16,
    pub short_address: u16,
    pub long_address: String,
    pub channel: i32,
    pub frequency: i32,
    pub fifop_threshold: u8,
    pub rx_fifo_len: usize,
    pub expected_frame_len: usize,
}

impl fmt::Display for ChipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            " VREG on: {}  Chip select: {}  OSC stable: {}",
            self.vreg_on, self.chip_select, self.osc_stable
        )?;
        writeln!(
            f,
            " RSSI valid: {}  CCA: {}  FIFOP: {}  FIFO: {}  SFD: {}",
            self.rssi_valid, self.cca, self.fifop, self.fifo, self.sfd
        )?;
        writeln!(
            f,
            " RX FIFO length: {}  expected frame length: {}",
            self.rx_fifo_len, self.expected_frame_len
        )?;
        writeln!(
            f,
            " Radio state: {:?}  SPI command: {}",
            self.state,
            self.spi_command.unwrap_or("-")
        )?;
        writeln!(
            f,
            " AutoACK: {}  AddrDecode: {}  AutoCRC: {}",
            self.auto_ack, self.address_decode, self.auto_crc
        )?;
        writeln!(
            f,
            " PAN id: 0x{:04x}  Short addr: 0x{:04x}  Long addr: {}",
            self.pan_id, self.short_address, self.long_address
        )?;
        writeln!(
            f,
            " Channel: {}  Frequency: {} MHz  FIFOP threshold: {}",
            self.channel, self.frequency, self.fifop_threshold
        )
    }
}
