//! Circular byte FIFO backed by a fixed region of chip RAM.
//!
//! The receive pipeline appends bytes at the write cursor while the SPI side
//! drains from the read cursor. Two extras beyond a plain ring buffer carry
//! the chip's frame semantics:
//!
//! - signed-offset `get`/`set`: negative offsets index back from the write
//!   cursor, used to read the received FCS and patch in RSSI/LQI afterwards;
//! - `mark`/`restore`: a snapshot of the write cursor taken at frame start so
//!   an address-filter mismatch can atomically discard the partial frame.

use crate::ram::RadioRam;

#[derive(Debug, Clone)]
pub struct ByteFifo {
    start: usize,
    capacity: usize,
    read_pos: usize,
    write_pos: usize,
    len: usize,
    mark_write: usize,
    mark_len: usize,
}

impl ByteFifo {
    pub fn new(start: usize, capacity: usize) -> Self {
        Self {
            start,
            capacity,
            read_pos: 0,
            write_pos: 0,
            len: 0,
            mark_write: 0,
            mark_len: 0,
        }
    }

    fn index(&self, pos: isize) -> usize {
        self.start + pos.rem_euclid(self.capacity as isize) as usize
    }

    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.len = 0;
        self.mark_write = 0;
        self.mark_len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Append one byte at the write cursor. Returns false when full.
    pub fn write(&mut self, ram: &mut RadioRam, value: u8) -> bool {
        if self.is_full() {
            return false;
        }
        ram.write(self.index(self.write_pos as isize), value);
        self.write_pos = (self.write_pos + 1) % self.capacity;
        self.len += 1;
        true
    }

    /// Pop one byte from the read cursor.
    pub fn read(&mut self, ram: &RadioRam) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let value = ram.read(self.index(self.read_pos as isize));
        self.read_pos = (self.read_pos + 1) % self.capacity;
        self.len -= 1;
        Some(value)
    }

    /// Relative peek: negative offsets count back from the write cursor,
    /// non-negative offsets count forward from the read cursor.
    pub fn get(&self, ram: &RadioRam, offset: isize) -> u8 {
        let pos = if offset < 0 {
            self.write_pos as isize + offset
        } else {
            self.read_pos as isize + offset
        };
        ram.read(self.index(pos))
    }

    /// Relative poke with the same addressing as [`get`](Self::get).
    pub fn set(&mut self, ram: &mut RadioRam, offset: isize, value: u8) {
        let pos = if offset < 0 {
            self.write_pos as isize + offset
        } else {
            self.read_pos as isize + offset
        };
        ram.write(self.index(pos), value);
    }

    /// Snapshot the write cursor so a partially written frame can be
    /// discarded with [`restore`](Self::restore).
    pub fn mark(&mut self) {
        self.mark_write = self.write_pos;
        self.mark_len = self.len;
    }

    /// Roll the write cursor back to the last [`mark`](Self::mark).
    pub fn restore(&mut self) {
        self.write_pos = self.mark_write;
        self.len = self.mark_len;
    }

    /// Compare the `pattern.len()` bytes that end `back` bytes before the
    /// write cursor against a literal pattern.
    pub fn tail_equals(&self, ram: &RadioRam, pattern: &[u8], back: usize) -> bool {
        let first = self.write_pos as isize - (back + pattern.len()) as isize;
        pattern
            .iter()
            .enumerate()
            .all(|(i, expected)| ram.read(self.index(first + i as isize)) == *expected)
    }

    /// Compare the trailing bytes against a RAM region (stored address or
    /// PAN id).
    pub fn tail_equals_ram(&self, ram: &RadioRam, src: usize, len: usize, back: usize) -> bool {
        let first = self.write_pos as isize - (back + len) as isize;
        (0..len).all(|i| ram.read(self.index(first + i as isize)) == ram.read(src + i))
    }
}
