//! Binary persistence.
//!
//! A table is stored as a sequence of little-endian fixed-width records:
//!
//! ```text
//! magic     "PHDT"
//! version   u16
//! len       u32                       number of entries
//! M         u32                       table size
//! min_len   u32, max_len u32
//! mode      u8                        0: all positions, 1: selected positions
//! npos      u32, positions u16 × npos (selected positions only)
//! nrows     u32, weights u64 × nrows × 256
//! nlen      u32, length weights u64 × nlen
//! shift     u32, ndisp u32, displacements u32 × ndisp
//! slots     M × (present u8 [, key_len u32, key bytes, value i64])
//! ```
//!
//! Loading a table runs the same validation as deserialization, so damaged data is rejected instead
//! of producing a table that misses keys.

use super::{
    error::ValidationError,
    hash::{HashParameters, Positions, ROW_LEN},
    key_set::KeyEntry,
    table::{PerfectHashTable, TableInner},
};
use alloc::{vec, vec::Vec};
use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use displaydoc::Display;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Leading bytes of every encoded table.
const MAGIC: &[u8; 4] = b"PHDT";

/// Format version written by this crate.
const VERSION: u16 = 1;

/// Vectors read from untrusted input are preallocated up to this many elements.
const PREALLOCATION_LIMIT: usize = 1 << 16;

/// Failure to load an encoded table.
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// failed to read table: {0}
    Io(#[from] io::Error),

    /// not an encoded table
    BadMagic,

    /// unsupported format version {0}
    UnsupportedVersion(u16),

    /// malformed table data: {0}
    Malformed(&'static str),

    /// invalid table: {0}
    Invalid(#[from] ValidationError),
}

impl PerfectHashTable {
    /// Write the table to `writer` in the binary format.
    ///
    /// # Errors
    ///
    /// Propagates errors of `writer`.
    #[expect(
        clippy::missing_inline_in_public_items,
        reason = "heavy, we'd rather not copy it to every crate"
    )]
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let TableInner { params, slots, len } = self.inner();

        writer.write_all(MAGIC)?;
        writer.write_u16::<LE>(VERSION)?;
        write_len(&mut writer, *len)?;
        writer.write_u32::<LE>(params.table_size)?;
        writer.write_u32::<LE>(params.min_len)?;
        writer.write_u32::<LE>(params.max_len)?;

        match &params.positions {
            Positions::All => writer.write_u8(0)?,
            Positions::Selected(offsets) => {
                writer.write_u8(1)?;
                write_len(&mut writer, offsets.len())?;
                for &offset in offsets.iter() {
                    writer.write_u16::<LE>(offset)?;
                }
            }
        }

        write_len(&mut writer, params.weights.len() / ROW_LEN)?;
        for &weight in params.weights.iter() {
            writer.write_u64::<LE>(weight)?;
        }
        write_len(&mut writer, params.length_weights.len())?;
        for &weight in params.length_weights.iter() {
            writer.write_u64::<LE>(weight)?;
        }

        writer.write_u32::<LE>(params.bucket_shift)?;
        write_len(&mut writer, params.displacements.len())?;
        for &displacement in params.displacements.iter() {
            writer.write_u32::<LE>(displacement)?;
        }

        for slot in slots {
            match slot {
                None => writer.write_u8(0)?,
                Some(entry) => {
                    writer.write_u8(1)?;
                    write_len(&mut writer, entry.key().len())?;
                    writer.write_all(entry.key())?;
                    writer.write_i64::<LE>(entry.value())?;
                }
            }
        }
        Ok(())
    }

    /// Encode the table into a byte vector.
    ///
    /// # Errors
    ///
    /// Never fails for tables produced by this crate; a length that does not fit in the format is
    /// reported as an I/O error.
    #[inline]
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a table written by [`write_to`](Self::write_to).
    ///
    /// Data following the table is left unread.
    ///
    /// # Errors
    ///
    /// Fails if reading fails or ends early, or if the data does not describe a valid table.
    #[expect(
        clippy::missing_inline_in_public_items,
        reason = "heavy, we'd rather not copy it to every crate"
    )]
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, DecodeError> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = reader.read_u16::<LE>()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let len = reader.read_u32::<LE>()? as usize;
        let table_size = reader.read_u32::<LE>()?;
        let min_len = reader.read_u32::<LE>()?;
        let max_len = reader.read_u32::<LE>()?;

        let positions = match reader.read_u8()? {
            0 => Positions::All,
            1 => {
                let count = reader.read_u32::<LE>()? as usize;
                Positions::Selected(read_many(&mut reader, count, |r| r.read_u16::<LE>())?.into())
            }
            _ => return Err(DecodeError::Malformed("unknown position mode")),
        };

        let rows = reader.read_u32::<LE>()? as usize;
        let weight_count = rows
            .checked_mul(ROW_LEN)
            .ok_or(DecodeError::Malformed("too many weight rows"))?;
        let weights = read_many(&mut reader, weight_count, |r| r.read_u64::<LE>())?;
        let count = reader.read_u32::<LE>()? as usize;
        let length_weights = read_many(&mut reader, count, |r| r.read_u64::<LE>())?;

        let bucket_shift = reader.read_u32::<LE>()?;
        let count = reader.read_u32::<LE>()? as usize;
        let displacements = read_many(&mut reader, count, |r| r.read_u32::<LE>())?;

        let params = HashParameters {
            positions,
            weights: weights.into(),
            length_weights: length_weights.into(),
            table_size,
            bucket_shift,
            displacements: displacements.into(),
            min_len,
            max_len,
        };
        // Check the parameters before trusting `max_len` as a bound on key allocations.
        params.validate()?;

        let slots = read_many(&mut reader, table_size as usize, |r| {
            read_slot(r, max_len)
        })?;

        Ok(Self::try_from(TableInner { params, slots, len })?)
    }

    /// Decode a table produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Fails if the bytes do not hold exactly one valid table.
    #[inline]
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, DecodeError> {
        let table = Self::read_from(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(DecodeError::Malformed("trailing bytes"));
        }
        Ok(table)
    }
}

/// Write a length as `u32`.
fn write_len(writer: &mut impl Write, len: usize) -> io::Result<()> {
    writer.write_u32::<LE>(u32::try_from(len).map_err(io::Error::other)?)
}

/// Read `count` values with `read`.
fn read_many<R: Read, T, E>(
    reader: &mut R,
    count: usize,
    mut read: impl FnMut(&mut R) -> Result<T, E>,
) -> Result<Vec<T>, DecodeError>
where
    DecodeError: From<E>,
{
    let mut values = Vec::with_capacity(count.min(PREALLOCATION_LIMIT));
    for _ in 0..count {
        values.push(read(reader)?);
    }
    Ok(values)
}

/// Read one slot. Keys longer than `max_len` are rejected before they are read.
fn read_slot(reader: &mut impl Read, max_len: u32) -> Result<Option<KeyEntry>, DecodeError> {
    match reader.read_u8()? {
        0 => Ok(None),
        1 => {
            let key_len = reader.read_u32::<LE>()?;
            if key_len > max_len {
                return Err(ValidationError::KeyLengthOutOfBounds.into());
            }
            let mut key = vec![0; key_len as usize].into_boxed_slice();
            reader.read_exact(&mut key)?;
            let value = reader.read_i64::<LE>()?;
            Ok(Some(KeyEntry::new(key, value)))
        }
        _ => Err(DecodeError::Malformed("unknown slot flag")),
    }
}
