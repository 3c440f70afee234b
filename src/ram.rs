//! Byte-addressable chip RAM: TX/RX frame buffers plus the stored node
//! identity (long address, PAN id, short address).
//!
//! The frame buffer regions are only ever touched through the TX cursor and
//! the RX FIFO; everything else is plain byte access.

use crate::{CoreError, Result};

pub const RAM_SIZE: usize = 0x400;

pub const RAM_TXFIFO: usize = 0x100;
pub const RAM_RXFIFO: usize = 0x180;
pub const RAM_IEEEADDR: usize = 0x3EA;
pub const RAM_PANID: usize = 0x3F2;
pub const RAM_SHORTADDR: usize = 0x3F4;

pub const FRAME_BUFFER_LEN: usize = 128;

#[derive(Clone)]
pub struct RadioRam {
    bytes: [u8; RAM_SIZE],
}

impl Default for RadioRam {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioRam {
    pub fn new() -> Self {
        Self {
            bytes: [0; RAM_SIZE],
        }
    }

    pub fn read(&self, addr: usize) -> u8 {
        self.bytes[addr & (RAM_SIZE - 1)]
    }

    pub fn write(&mut self, addr: usize, value: u8) {
        self.bytes[addr & (RAM_SIZE - 1)] = value;
    }

    /// Bounds-checked access for host tooling.
    pub fn try_read(&self, addr: usize) -> Result<u8> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(CoreError::RamAddressOutOfRange(addr))
    }

    pub fn try_write(&mut self, addr: usize, value: u8) -> Result<()> {
        match self.bytes.get_mut(addr) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CoreError::RamAddressOutOfRange(addr)),
        }
    }

    pub fn region(&self, start: usize, len: usize) -> &[u8] {
        &self.bytes[start..start + len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_wrap_at_ram_size() {
        let mut ram = RadioRam::new();
        ram.write(RAM_SIZE + 5, 0xAB);
        assert_eq!(ram.read(5), 0xAB);
    }

    #[test]
    fn try_access_rejects_out_of_range() {
        let mut ram = RadioRam::new();
        assert!(ram.try_write(RAM_SIZE, 1).is_err());
        assert!(ram.try_read(RAM_SIZE).is_err());
        assert!(ram.try_write(RAM_PANID, 0x22).is_ok());
        assert_eq!(ram.try_read(RAM_PANID).unwrap(), 0x22);
    }

    #[test]
    fn identity_regions_do_not_overlap_frame_buffers() {
        assert!(RAM_RXFIFO + FRAME_BUFFER_LEN <= RAM_IEEEADDR);
        assert!(RAM_IEEEADDR + 8 <= RAM_PANID);
        assert!(RAM_PANID + 2 <= RAM_SHORTADDR);
        assert!(RAM_SHORTADDR + 2 <= RAM_SIZE);
    }
}
