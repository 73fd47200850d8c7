//! Tuned hash functions.
//!
//! A key is hashed in two steps. First, its *signature* is computed as a sum of weights: one
//! weight per selected byte position, looked up by the byte value at that position, plus one
//! weight looked up by the key length. This is the classic gperf construction, except that every
//! position has its own 256-entry row of 64-bit weights.
//!
//! Second, the signature is scaled to the table size `M`. The high half of `signature * M` is the
//! *approximate slot*, always below `M`; the top bits of the low half select a *bucket*. Every
//! bucket carries a displacement that is added to the approximate slot modulo `M`.
//!
//! The search in this crate picks weights so that no two keys share both the approximate slot and
//! the bucket, and then picks displacements so that no two keys share the final slot.

#![allow(
    clippy::arithmetic_side_effects,
    reason = "wrapping is explicit, everything else is bounded by the table size"
)]

use super::error::ValidationError;
use alloc::boxed::Box;

/// Number of weights in one row: one per byte value.
pub const ROW_LEN: usize = 256;

/// Byte positions taking part in hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Positions {
    /// Every byte of the key. Row `p` weighs the byte at offset `p`.
    All,

    /// The listed offsets, strictly increasing. Row `i` weighs the byte at offset `positions[i]`.
    ///
    /// Offsets past the end of a key contribute nothing.
    Selected(Box<[u16]>),
}

/// Parameters of a hash function that is perfect on a particular key set.
///
/// Produced by the builder and owned by a [`PerfectHashTable`](crate::PerfectHashTable).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashParameters {
    /// Which bytes are weighed.
    pub(crate) positions: Positions,

    /// Weight rows, `ROW_LEN` weights each, row-major.
    pub(crate) weights: Box<[u64]>,

    /// Weight of each key length in `min_len..=max_len`, indexed by `len - min_len`.
    pub(crate) length_weights: Box<[u64]>,

    /// Table size `M`.
    pub(crate) table_size: u32,

    /// `64 - ilog2(displacements.len())`
    pub(crate) bucket_shift: u32,

    /// Per-bucket displacements, each below `table_size`.
    pub(crate) displacements: Box<[u32]>,

    /// Length of the shortest key.
    pub(crate) min_len: u32,

    /// Length of the longest key.
    pub(crate) max_len: u32,
}

impl HashParameters {
    /// Parameters of a table without keys. No key has a slot.
    pub(crate) fn empty() -> Self {
        Self {
            positions: Positions::All,
            weights: Box::default(),
            length_weights: Box::default(),
            table_size: 0,
            bucket_shift: 0,
            displacements: Box::default(),
            min_len: 0,
            max_len: 0,
        }
    }

    /// Compute the slot of a key.
    ///
    /// Distinct keys from the build set always get distinct slots. Other keys may land on any
    /// slot, or get `None` when their length is outside the lengths of the build set.
    #[inline]
    #[must_use]
    pub fn slot(&self, key: &[u8]) -> Option<usize> {
        if key.len() < self.min_len as usize || key.len() > self.max_len as usize {
            return None;
        }
        let (approx, bucket) = split(self.signature(key)?, self.table_size, self.bucket_shift);
        let displacement = *self.displacements.get(bucket)?;
        Some(place(approx, displacement, self.table_size))
    }

    /// Compute the signature of a key.
    ///
    /// Returns `None` for keys whose length is outside the lengths of the build set.
    pub(crate) fn signature(&self, key: &[u8]) -> Option<u64> {
        let mut signature = *self
            .length_weights
            .get(key.len().checked_sub(self.min_len as usize)?)?;
        match &self.positions {
            Positions::All => {
                for (row, &byte) in key.iter().enumerate() {
                    signature = signature.wrapping_add(self.weight(row, byte)?);
                }
            }
            Positions::Selected(positions) => {
                for (row, &position) in positions.iter().enumerate() {
                    if let Some(&byte) = key.get(usize::from(position)) {
                        signature = signature.wrapping_add(self.weight(row, byte)?);
                    }
                }
            }
        }
        Some(signature)
    }

    /// Look up the weight of `byte` in row `row`.
    fn weight(&self, row: usize, byte: u8) -> Option<u64> {
        self.weights.get(row * ROW_LEN + usize::from(byte)).copied()
    }

    /// The weighed byte positions.
    #[inline]
    #[must_use]
    pub const fn positions(&self) -> &Positions {
        &self.positions
    }

    /// The table size `M`. Slots are below this value.
    #[inline]
    #[must_use]
    pub const fn table_size(&self) -> usize {
        self.table_size as usize
    }

    /// The number of buckets, i.e. of displacements.
    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.displacements.len()
    }

    /// The range of key lengths that can be present.
    #[inline]
    #[must_use]
    pub const fn key_lengths(&self) -> core::ops::RangeInclusive<usize> {
        self.min_len as usize..=self.max_len as usize
    }

    /// Number of weight rows the position set requires.
    pub(crate) fn row_count(&self) -> usize {
        match &self.positions {
            Positions::All => self.max_len as usize,
            Positions::Selected(positions) => positions.len(),
        }
    }

    /// Check that the parameters are internally consistent.
    ///
    /// Consistent parameters never index out of bounds, and every slot is below the table size.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.table_size == 0 {
            let trivial = self.weights.is_empty()
                && self.length_weights.is_empty()
                && self.displacements.is_empty()
                && self.max_len == 0;
            return if trivial {
                Ok(())
            } else {
                Err(ValidationError::Parameters("weights present in an empty table"))
            };
        }

        if self.min_len == 0 || self.min_len > self.max_len {
            return Err(ValidationError::Parameters("bad key length bounds"));
        }
        if self.length_weights.len() != (self.max_len - self.min_len) as usize + 1 {
            return Err(ValidationError::Parameters("wrong length weight count"));
        }
        if let Positions::Selected(positions) = &self.positions {
            if positions.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(ValidationError::Parameters("positions are not increasing"));
            }
        }
        if self.weights.len() != self.row_count() * ROW_LEN {
            return Err(ValidationError::Parameters("wrong weight count"));
        }
        if !(1..64).contains(&self.bucket_shift) {
            return Err(ValidationError::Parameters("bucket shift out of range"));
        }
        if self.displacements.len() as u64 != 1 << (64 - self.bucket_shift) {
            return Err(ValidationError::Parameters("wrong displacement count"));
        }
        if self.displacements.iter().any(|&d| d >= self.table_size) {
            return Err(ValidationError::Parameters("displacement out of range"));
        }
        Ok(())
    }
}

/// Split a signature into `(approximate slot, bucket)` under the given table size.
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "the high half is below table_size, the bucket is below the bucket count"
)]
pub(crate) const fn split(signature: u64, table_size: u32, bucket_shift: u32) -> (u32, usize) {
    let product = signature as u128 * table_size as u128;
    let (high, low) = ((product >> 64i32) as u32, product as u64);
    (high, low.wrapping_shr(bucket_shift) as usize)
}

/// Add a displacement to an approximate slot, modulo the table size.
///
/// Both arguments must be below `table_size`.
#[inline]
#[expect(clippy::cast_possible_truncation, reason = "slot < table_size <= u32::MAX")]
pub(crate) const fn place(approx: u32, displacement: u32, table_size: u32) -> usize {
    let slot = approx as u64 + displacement as u64;
    if slot >= table_size as u64 {
        (slot - table_size as u64) as usize
    } else {
        slot as usize
    }
}
