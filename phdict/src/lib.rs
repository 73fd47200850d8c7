//! Static perfect hash dictionaries.
//!
//! This crate builds, from a closed set of byte-string keys optionally paired with integer values,
//! an immutable [`PerfectHashTable`] answering exact-match membership and value queries. The hash
//! function is searched for at build time so that no two keys from the set share a slot, which
//! makes lookups a single slot probe followed by one key comparison: no probing sequences, no
//! chains, and a cost that depends on the key length only.
//!
//! The approach is the one popularized by [gperf]: a key's hash is a weighted sum of some of its
//! bytes plus a term for its length, and the weights are tuned until the keys stop colliding.
//!
//! [gperf]: https://www.gnu.org/software/gperf/
//!
//!
//! # Usage
//!
//! ```
//! let months = phdict::construct(
//!     ["january", "february", "march", "april", "may", "june"],
//!     phdict::Options::default(),
//! )?;
//! assert_eq!(months.get("march"), Ok(2));
//! assert!(!months.contains("feb"));
//! # Ok::<(), phdict::BuildError>(())
//! ```
//!
//! Explicit values are passed as key-value pairs, and [`Builder`] exposes the search knobs:
//!
//! ```
//! use phdict::{Builder, Input};
//!
//! let table = Builder::new()
//!     .seed(7)
//!     .load_factor(0.8)
//!     .build(Input::Entries(vec![("a", 10), ("b", 20)]))?;
//! assert_eq!(table.get("b"), Ok(20));
//! # Ok::<(), phdict::BuildError>(())
//! ```
//!
//! Tables are read-only after construction and can be shared between threads freely. With the
//! `std` feature (on by default) a table can be saved with [`PerfectHashTable::write_to`] and loaded
//! back with [`PerfectHashTable::read_from`] without repeating the search.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub(crate) mod bitmap;
mod builder;
#[cfg(feature = "std")]
mod codec;
mod error;
pub mod hash;
mod key_set;
pub(crate) mod scatter;
mod search;
mod table;

pub use builder::{construct, Builder, Options, DEFAULT_MAX_POSITIONS};
#[cfg(feature = "std")]
pub use codec::DecodeError;
pub use error::{BuildError, InvalidKeyReason, KeyNotFound, ValidationError};
pub use hash::HashParameters;
pub use key_set::{Input, KeyEntry, KeySet};
pub use table::PerfectHashTable;

#[cfg(test)]
mod tests;
