//! CRC-16/CCITT accumulator with bit-reversed byte handling.
//!
//! IEEE 802.15.4 transmits frame bytes LSB first while the CCITT polynomial
//! is defined MSB first, so every byte is bit-reversed on the way in and the
//! two FCS bytes are bit-reversed on the way out. The same accumulator is
//! used for validating received frames and for generating the trailing FCS
//! of outgoing frames and acknowledgments.

#[derive(Debug, Default, Clone, Copy)]
pub struct CcittCrc {
    crc: u16,
}

impl CcittCrc {
    pub fn new() -> Self {
        Self { crc: 0 }
    }

    pub fn set(&mut self, value: u16) {
        self.crc = value;
    }

    /// Fold one byte (MSB-first bit order) into the accumulator.
    pub fn add(&mut self, data: u8) -> u16 {
        let mut crc = (self.crc >> 8) | (self.crc << 8);
        crc ^= data as u16;
        crc ^= (crc & 0xff) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0xff) << 5;
        self.crc = crc;
        crc
    }

    /// Fold one byte as it appears on the air (LSB first).
    pub fn add_bitrev(&mut self, data: u8) -> u16 {
        self.add(data.reverse_bits())
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// First FCS byte as transmitted on the air.
    pub fn crc_hi(&self) -> u8 {
        (self.crc as u8).reverse_bits()
    }

    /// Second FCS byte as transmitted on the air.
    pub fn crc_lo(&self) -> u8 {
        ((self.crc >> 8) as u8).reverse_bits()
    }

    /// FCS in on-air byte order, packed hi-first for comparison against the
    /// two trailing bytes of a received frame.
    pub fn crc_bitrev(&self) -> u16 {
        ((self.crc_hi() as u16) << 8) | self.crc_lo() as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fcs_of(payload: &[u8]) -> (u8, u8) {
        let mut crc = CcittCrc::new();
        for byte in payload {
            crc.add_bitrev(*byte);
        }
        (crc.crc_hi(), crc.crc_lo())
    }

    #[test]
    fn empty_payload_has_zero_fcs() {
        let crc = CcittCrc::new();
        assert_eq!(crc.crc_bitrev(), 0);
    }

    #[test]
    fn hi_lo_pack_matches_bitrev_word() {
        let mut crc = CcittCrc::new();
        for byte in [0x21, 0x88, 0x42, 0xab, 0xcd] {
            crc.add_bitrev(byte);
        }
        let packed = ((crc.crc_hi() as u16) << 8) | crc.crc_lo() as u16;
        assert_eq!(packed, crc.crc_bitrev());
    }

    #[test]
    fn set_resets_accumulator() {
        let mut crc = CcittCrc::new();
        crc.add_bitrev(0x5a);
        crc.set(0);
        assert_eq!(crc.crc(), 0);
    }

    proptest! {
        #[test]
        fn generated_fcs_validates_on_receive(payload in proptest::collection::vec(any::<u8>(), 1..100)) {
            let (hi, lo) = fcs_of(&payload);
            // Receiver side: accumulate the payload, then compare the two
            // trailing bytes against the bit-reversed accumulator value.
            let mut rx = CcittCrc::new();
            for byte in &payload {
                rx.add_bitrev(*byte);
            }
            let received = ((hi as u16) << 8) | lo as u16;
            prop_assert_eq!(received, rx.crc_bitrev());
        }

        #[test]
        fn single_bit_flip_breaks_fcs(
            payload in proptest::collection::vec(any::<u8>(), 1..100),
            idx in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let (hi, lo) = fcs_of(&payload);
            let mut corrupted = payload.clone();
            let i = idx.index(corrupted.len());
            corrupted[i] ^= 1 << bit;
            let mut rx = CcittCrc::new();
            for byte in &corrupted {
                rx.add_bitrev(*byte);
            }
            let received = ((hi as u16) << 8) | lo as u16;
            prop_assert_ne!(received, rx.crc_bitrev());
        }
    }
}
