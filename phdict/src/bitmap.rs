//! Bitmap API.

use alloc::{vec, vec::Vec};

/// Bit-compressed [`Vec<bool>`], used to track taken slots during placement.
pub struct BitMap {
    /// Underlying container.
    ///
    /// Bit `index` is stored in word `index / 64` at bit `index % 64`, counting from LSB.
    data: Vec<u64>,
}

impl BitMap {
    /// Create a bitmap of a given length, filled with zero bits.
    pub fn new_zeros(len: usize) -> Self {
        Self {
            data: vec![0; len.div_ceil(64)],
        }
    }

    /// Get the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the bitmap.
    pub fn get(&self, index: usize) -> bool {
        (self.data[index / 64] >> (index % 64)) & 1 != 0
    }

    /// Set the bit at `index` to one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the bitmap.
    pub fn set(&mut self, index: usize) {
        self.data[index / 64] |= 1 << (index % 64);
    }
}
