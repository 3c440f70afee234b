//! Register map, status bits and SPI instruction opcodes, following the
//! CC2520 datasheet numbering.

pub const NUM_REGISTERS: usize = 128;

// FREG registers (reachable with the short register instructions).
pub const REG_FRMFILT0: u8 = 0x00;
pub const REG_FRMFILT1: u8 = 0x01;
pub const REG_SRCMATCH: u8 = 0x02;
pub const REG_SRCSHORTEN0: u8 = 0x04;
pub const REG_SRCSHORTEN1: u8 = 0x05;
pub const REG_SRCSHORTEN2: u8 = 0x06;
pub const REG_SRCEXTEN0: u8 = 0x08;
pub const REG_SRCEXTEN1: u8 = 0x09;
pub const REG_SRCEXTEN2: u8 = 0x0A;
pub const REG_FRMCTRL0: u8 = 0x0C;
pub const REG_FRMCTRL1: u8 = 0x0D;
pub const REG_RXENABLE0: u8 = 0x0E;
pub const REG_RXENABLE1: u8 = 0x0F;
pub const REG_EXCFLAG0: u8 = 0x10;
pub const REG_EXCFLAG1: u8 = 0x11;
pub const REG_EXCFLAG2: u8 = 0x12;
pub const REG_EXCMASKA0: u8 = 0x14;
pub const REG_EXCMASKA1: u8 = 0x15;
pub const REG_EXCMASKA2: u8 = 0x16;
pub const REG_EXCMASKB0: u8 = 0x18;
pub const REG_EXCMASKB1: u8 = 0x19;
pub const REG_EXCMASKB2: u8 = 0x1A;
pub const REG_EXCBINDX0: u8 = 0x1C;
pub const REG_EXCBINDX1: u8 = 0x1D;
pub const REG_EXCBINDY0: u8 = 0x1E;
pub const REG_EXCBINDY1: u8 = 0x1F;
pub const REG_GPIOCTRL0: u8 = 0x20;
pub const REG_GPIOCTRL1: u8 = 0x21;
pub const REG_GPIOCTRL2: u8 = 0x22;
pub const REG_GPIOCTRL3: u8 = 0x23;
pub const REG_GPIOCTRL4: u8 = 0x24;
pub const REG_GPIOCTRL5: u8 = 0x25;
pub const REG_GPIOPOLARITY: u8 = 0x26;
pub const REG_GPIOCTRL: u8 = 0x28;
pub const REG_DPUCON: u8 = 0x2A;
pub const REG_DPUSTAT: u8 = 0x2C;
pub const REG_FREQCTRL: u8 = 0x2E;
pub const REG_FREQTUNE: u8 = 0x2F;
pub const REG_TXPOWER: u8 = 0x30;
pub const REG_TXCTRL: u8 = 0x31;
pub const REG_FSMSTAT0: u8 = 0x32;
pub const REG_FSMSTAT1: u8 = 0x33;
pub const REG_FIFOPCTRL: u8 = 0x34;
pub const REG_FSMCTRL: u8 = 0x35;
pub const REG_CCACTRL0: u8 = 0x36;
pub const REG_CCACTRL1: u8 = 0x37;
pub const REG_RSSI: u8 = 0x38;
pub const REG_RSSISTAT: u8 = 0x39;
pub const REG_TXFIFO_BUF: u8 = 0x3A;
pub const REG_RXFIRST: u8 = 0x3C;
pub const REG_RXFIFOCNT: u8 = 0x3E;
pub const REG_TXFIFOCNT: u8 = 0x3F;

// SREG registers (memory instructions only).
pub const REG_CHIPID: u8 = 0x40;
pub const REG_VERSION: u8 = 0x42;
pub const REG_EXTCLOCK: u8 = 0x44;
pub const REG_MDMCTRL0: u8 = 0x46;
pub const REG_MDMCTRL1: u8 = 0x47;
pub const REG_FREQEST: u8 = 0x48;
pub const REG_RXCTRL: u8 = 0x4A;
pub const REG_FSCTRL: u8 = 0x4C;
pub const REG_FSCAL0: u8 = 0x4E;
pub const REG_FSCAL1: u8 = 0x4F;
pub const REG_FSCAL2: u8 = 0x50;
pub const REG_FSCAL3: u8 = 0x51;
pub const REG_AGCCTRL0: u8 = 0x52;
pub const REG_AGCCTRL1: u8 = 0x53;
pub const REG_AGCCTRL2: u8 = 0x54;
pub const REG_AGCCTRL3: u8 = 0x55;
pub const REG_ADCTEST0: u8 = 0x56;
pub const REG_ADCTEST1: u8 = 0x57;
pub const REG_ADCTEST2: u8 = 0x58;
pub const REG_MDMTEST0: u8 = 0x5A;
pub const REG_MDMTEST1: u8 = 0x5B;
pub const REG_DACTEST0: u8 = 0x5C;
pub const REG_DACTEST1: u8 = 0x5D;
pub const REG_ATEST: u8 = 0x5E;
pub const REG_DACTEST2: u8 = 0x5F;
pub const REG_PTEST0: u8 = 0x60;
pub const REG_PTEST1: u8 = 0x61;
pub const REG_RESERVED: u8 = 0x62;
pub const REG_DPUBIST: u8 = 0x7A;
pub const REG_ACTBIST: u8 = 0x7C;
pub const REG_RAMBIST: u8 = 0x7E;

// SPI instruction opcodes.
pub const INS_SNOP: u8 = 0x00;
pub const INS_IBUFLD: u8 = 0x02;
pub const INS_SIBUFEX: u8 = 0x03;
pub const INS_SSAMPLECCA: u8 = 0x04;
pub const INS_SRES: u8 = 0x0F;
pub const INS_MEMRD: u8 = 0x10;
pub const INS_MEMWR: u8 = 0x20;
pub const INS_RXBUF: u8 = 0x30;
pub const INS_RXBUFCP: u8 = 0x38;
pub const INS_RXBUFMOV: u8 = 0x32;
pub const INS_TXBUF: u8 = 0x3A;
pub const INS_TXBUFCP: u8 = 0x3E;
pub const INS_RANDOM: u8 = 0x3C;
pub const INS_SXOSCON: u8 = 0x40;
pub const INS_STXCAL: u8 = 0x41;
pub const INS_SRXON: u8 = 0x42;
pub const INS_STXON: u8 = 0x43;
pub const INS_STXONCCA: u8 = 0x44;
pub const INS_SRFOFF: u8 = 0x45;
pub const INS_SXOSCOFF: u8 = 0x46;
pub const INS_SFLUSHRX: u8 = 0x47;
pub const INS_SFLUSHTX: u8 = 0x48;
pub const INS_SACK: u8 = 0x49;
pub const INS_SACKPEND: u8 = 0x4A;
pub const INS_SNACK: u8 = 0x4B;
pub const INS_SRXMASKBITSET: u8 = 0x4C;
pub const INS_SRXMASKBITCLR: u8 = 0x4D;
pub const INS_RXMASKAND: u8 = 0x4E;
pub const INS_RXMASKOR: u8 = 0x4F;
pub const INS_MEMCP: u8 = 0x50;
pub const INS_MEMCPR: u8 = 0x52;
pub const INS_MEMXCP: u8 = 0x54;
pub const INS_MEMXWR: u8 = 0x56;
pub const INS_BCLR: u8 = 0x58;
pub const INS_BSET: u8 = 0x59;
pub const INS_CTR: u8 = 0x60;
pub const INS_CBCMAC: u8 = 0x64;
pub const INS_UCBCMAC: u8 = 0x66;
pub const INS_CCM: u8 = 0x68;
pub const INS_UCCM: u8 = 0x6A;
pub const INS_ECB: u8 = 0x70;
pub const INS_ECBO: u8 = 0x72;
pub const INS_ECBX: u8 = 0x74;
pub const INS_ECBXO: u8 = 0x76;
pub const INS_INC: u8 = 0x78;
pub const INS_ABORT: u8 = 0x7F;
pub const INS_REGRD: u8 = 0x80;
pub const INS_REGWR: u8 = 0xC0;

// Status byte flags.
pub const STATUS_XOSC16M_STABLE: u8 = 1 << 7;
pub const STATUS_RSSI_VALID: u8 = 1 << 6;
pub const STATUS_EXCEPTION_CHA: u8 = 1 << 5;
pub const STATUS_EXCEPTION_CHB: u8 = 1 << 4;
pub const STATUS_DPU_H: u8 = 1 << 3;
pub const STATUS_DPU_L: u8 = 1 << 2;
pub const STATUS_TX_ACTIVE: u8 = 1 << 1;
pub const STATUS_RX_ACTIVE: u8 = 1 << 0;

// GPIOPOLARITY bits, one per routed signal.
pub const FIFO_POLARITY: u16 = 1 << 10;
pub const FIFOP_POLARITY: u16 = 1 << 9;
pub const SFD_POLARITY: u16 = 1 << 8;
pub const CCA_POLARITY: u16 = 1 << 7;
pub const POLARITY_MASK: u16 = FIFO_POLARITY | FIFOP_POLARITY | SFD_POLARITY | CCA_POLARITY;

// FIFOPCTRL: programmable FIFOP threshold.
pub const FIFOP_THR_MASK: u16 = 0x7F;

// MDMCTRL0 bits.
pub const ADR_DECODE: u16 = 1 << 11;
pub const ADR_AUTOCRC: u16 = 1 << 5;
pub const AUTOACK: u16 = 1 << 4;

// Frame control field, low byte.
pub const FRAME_TYPE: u8 = 0x07;
pub const SECURITY_ENABLED: u8 = 1 << 3;
pub const FRAME_PENDING: u8 = 1 << 4;
pub const ACK_REQUEST: u8 = 1 << 5;
pub const INTRA_PAN: u8 = 1 << 6;

pub const TYPE_BEACON_FRAME: u8 = 0x00;
pub const TYPE_DATA_FRAME: u8 = 0x01;
pub const TYPE_ACK_FRAME: u8 = 0x02;

// Destination addressing modes (frame control high byte, bits 2..4).
pub const SHORT_ADDRESS: u8 = 2;
pub const LONG_ADDRESS: u8 = 3;

// Sequence number position inside an ACK frame.
pub const ACK_SEQPOS: usize = 3;

pub const BROADCAST_ADDRESS: [u8; 2] = [0xFF, 0xFF];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_instruction_families_do_not_collide() {
        // High-bit patterns used by the SPI decoder must stay disjoint.
        assert_eq!(INS_REGRD & 0xC0, 0x80);
        assert_eq!(INS_REGWR & 0xC0, 0xC0);
        assert_eq!(INS_MEMRD & 0xF0, 0x10);
        assert_eq!(INS_MEMWR & 0xF0, 0x20);
        assert!(INS_TXBUF & 0xC0 == 0 && INS_RXBUF & 0xC0 == 0);
    }
}
