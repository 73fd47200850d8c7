//! Error types.

use alloc::string::String;
use displaydoc::Display;
use thiserror::Error;

/// Failure to build a [`PerfectHashTable`](crate::PerfectHashTable).
///
/// Build errors are reported before any table is published; there is no partially built state to
/// clean up.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// key #{index} is invalid: {reason}
    InvalidKey {
        /// Position of the key in the input.
        index: usize,
        /// What is wrong with the key.
        reason: InvalidKeyReason,
    },

    /// key {key:?} is given conflicting values {first} and {second}
    DuplicateKey {
        /// The repeated key, lossily decoded as UTF-8.
        key: String,
        /// The value of the first occurrence.
        first: i64,
        /// The conflicting value.
        second: i64,
    },

    /// no collision-free hash found after {attempts} attempts, last table size {table_size}
    Construction {
        /// Number of attempts made, including the first one.
        attempts: usize,
        /// Table size used by the last attempt.
        table_size: usize,
    },

    /// invalid build options: {0}
    InvalidOptions(&'static str),
}

/// Why a key was rejected.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidKeyReason {
    /// the key is empty
    Empty,

    /// the key is {len} bytes long, longer than the supported 65535 bytes
    TooLong {
        /// Length of the rejected key.
        len: usize,
    },
}

/// key not found
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_structs, reason = "callers construct it to compare lookup results")]
pub struct KeyNotFound;

/// Table parts that do not form a valid table.
///
/// Returned when loading a table whose parameters or slots are inconsistent, e.g. because the
/// serialized data was corrupted.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// wrong number of slots
    WrongSlotCount,

    /// wrong len
    WrongLen,

    /// misplaced entry
    MisplacedEntry,

    /// key length outside of the recorded bounds
    KeyLengthOutOfBounds,

    /// inconsistent hash parameters: {0}
    Parameters(&'static str),
}
