//! SPI instruction decoding and per-command session state.
//!
//! The chip is byte-oriented: every transferred byte produces a reply byte
//! (the status byte unless the active command says otherwise). The first
//! byte of a command selects the instruction family; multi-byte commands
//! accumulate follow-up bytes in a [`SpiSession`] that is discarded when
//! chip-select deasserts, however incomplete.

use crate::regs::*;

/// Instruction family selected by the first command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Immediate register read; the reply carries the register value.
    RegRead(u8),
    /// Register write; one data byte follows.
    RegWrite(u8),
    /// Streaming memory read; the low address byte follows, then one memory
    /// byte is replied per transfer.
    MemRead(u8),
    /// Streaming memory write with the same addressing.
    MemWrite(u8),
    /// Streaming RX FIFO drain.
    RxBuf,
    /// Streaming TX FIFO fill.
    TxBuf,
    /// Single-byte command strobe.
    Strobe(u8),
    /// Recognized but unimplemented instruction; accepted as a no-op.
    Stub(u8),
    Unknown(u8),
}

impl Instruction {
    pub fn decode(byte: u8) -> Instruction {
        if byte & 0xC0 == INS_REGWR {
            return Instruction::RegWrite(byte & 0x3F);
        }
        if byte & 0xC0 == INS_REGRD {
            return Instruction::RegRead(byte & 0x3F);
        }
        if byte & 0xF0 == INS_MEMRD {
            return Instruction::MemRead(byte & 0x0F);
        }
        if byte & 0xF0 == INS_MEMWR {
            return Instruction::MemWrite(byte & 0x0F);
        }
        match byte {
            INS_RXBUF => Instruction::RxBuf,
            INS_TXBUF => Instruction::TxBuf,
            INS_SNOP | INS_SXOSCON | INS_SRXON | INS_STXON | INS_STXONCCA | INS_SRFOFF
            | INS_SXOSCOFF | INS_SFLUSHRX | INS_SFLUSHTX | INS_SACK | INS_SACKPEND => {
                Instruction::Strobe(byte)
            }
            INS_IBUFLD | INS_SIBUFEX | INS_SSAMPLECCA | INS_SRES | INS_RXBUFCP | INS_RXBUFMOV
            | INS_TXBUFCP | INS_RANDOM | INS_STXCAL | INS_SNACK | INS_SRXMASKBITSET
            | INS_SRXMASKBITCLR | INS_RXMASKAND | INS_RXMASKOR | INS_MEMCP | INS_MEMCPR
            | INS_MEMXCP | INS_MEMXWR | INS_BCLR | INS_BSET | INS_CTR | INS_CBCMAC
            | INS_UCBCMAC | INS_CCM | INS_UCCM | INS_ECB | INS_ECBO | INS_ECBX | INS_ECBXO
            | INS_INC | INS_ABORT => Instruction::Stub(byte),
            other => Instruction::Unknown(other),
        }
    }
}

/// Multi-byte command in flight between chip-select assert and completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    /// Register write waiting for its data byte.
    RegWrite { addr: u8 },
    /// Memory access waiting for the low address byte.
    MemAddress { write: bool, high: u8 },
    MemRead { addr: u16 },
    MemWrite { addr: u16 },
    RxBuf,
    TxBuf,
}

impl PendingOp {
    pub fn describe(&self) -> &'static str {
        match self {
            PendingOp::RegWrite { .. } => "REGWR",
            PendingOp::MemAddress { write: false, .. } | PendingOp::MemRead { .. } => "MEMRD",
            PendingOp::MemAddress { write: true, .. } | PendingOp::MemWrite { .. } => "MEMWR",
            PendingOp::RxBuf => "RXBUF",
            PendingOp::TxBuf => "TXBUF",
        }
    }
}

/// Transient SPI state, alive only while chip-select stays asserted.
#[derive(Debug, Default)]
pub struct SpiSession {
    pub op: Option<PendingOp>,
}

impl SpiSession {
    /// Abandon whatever was in flight; called on chip-select deassert.
    pub fn reset(&mut self) {
        self.op = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_family_uses_high_bits() {
        assert_eq!(Instruction::decode(0x80), Instruction::RegRead(0x00));
        assert_eq!(Instruction::decode(0xB4), Instruction::RegRead(0x34));
        assert_eq!(Instruction::decode(0xC0 | 0x34), Instruction::RegWrite(0x34));
        assert_eq!(Instruction::decode(0xFF), Instruction::RegWrite(0x3F));
    }

    #[test]
    fn memory_family_carries_high_address_nibble() {
        assert_eq!(Instruction::decode(0x11), Instruction::MemRead(0x01));
        assert_eq!(Instruction::decode(0x23), Instruction::MemWrite(0x03));
    }

    #[test]
    fn fifo_and_strobe_opcodes() {
        assert_eq!(Instruction::decode(INS_RXBUF), Instruction::RxBuf);
        assert_eq!(Instruction::decode(INS_TXBUF), Instruction::TxBuf);
        assert_eq!(Instruction::decode(INS_SRXON), Instruction::Strobe(INS_SRXON));
        assert_eq!(Instruction::decode(INS_SNOP), Instruction::Strobe(INS_SNOP));
    }

    #[test]
    fn crypto_and_copy_opcodes_are_stubs() {
        for ins in [
            INS_CCM, INS_CTR, INS_ECB, INS_MEMCP, INS_BSET, INS_RANDOM, INS_STXCAL, INS_SNACK,
        ] {
            assert_eq!(Instruction::decode(ins), Instruction::Stub(ins));
        }
    }

    #[test]
    fn unassigned_opcodes_are_unknown() {
        assert_eq!(Instruction::decode(0x05), Instruction::Unknown(0x05));
        assert_eq!(Instruction::decode(0x31), Instruction::Unknown(0x31));
    }

    #[test]
    fn session_reset_drops_pending_command() {
        let mut session = SpiSession {
            op: Some(PendingOp::MemAddress {
                write: true,
                high: 3,
            }),
        };
        session.reset();
        assert!(session.op.is_none());
    }
}
