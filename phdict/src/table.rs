//! Perfect hash tables.

use super::{
    error::{KeyNotFound, ValidationError},
    hash::HashParameters,
    key_set::KeyEntry,
    scatter::scatter,
};
use alloc::vec::Vec;

/// An immutable dictionary over a fixed set of byte-string keys.
///
/// Every key of the build set sits in the slot computed by the table's [`HashParameters`], so a
/// lookup hashes the query, probes one slot and compares the stored key with the query. Keys outside
/// the build set are never reported as present.
///
/// Tables are created with [`construct`](crate::construct) or [`Builder`](crate::Builder) and never
/// change afterwards, so `&PerfectHashTable` can be shared between threads freely.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "TableInner"))]
pub struct PerfectHashTable {
    /// The actual table.
    inner: TableInner,
}

/// The actual table.
///
/// This is a separate type so that deserialization and the binary codec can assemble a table from
/// parts and pass it through [`TryFrom`] for validation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct TableInner {
    /// The hash function mapping keys to indices in [`slots`](Self::slots).
    pub(crate) params: HashParameters,

    /// The entries, indexed by the slots of their keys. `None` marks a free slot.
    pub(crate) slots: Vec<Option<KeyEntry>>,

    /// The number of entries.
    ///
    /// This is equal to the number of `Some` values in [`slots`](Self::slots).
    pub(crate) len: usize,
}

impl PerfectHashTable {
    /// Put entries into the slots chosen by `params`.
    ///
    /// `params` must be perfect on the keys of `entries`.
    pub(crate) fn from_entries(params: HashParameters, entries: Vec<KeyEntry>) -> Self {
        let mut slots: Vec<Option<KeyEntry>> = (0..params.table_size()).map(|_| None).collect();
        scatter(entries, |entry| params.slot(entry.key()), &mut slots);
        let len = slots.iter().filter(|slot| slot.is_some()).count();
        Self {
            inner: TableInner { params, slots, len },
        }
    }

    /// Access the parts, e.g. for encoding.
    pub(crate) const fn inner(&self) -> &TableInner {
        &self.inner
    }

    /// Look up the entry of a key.
    ///
    /// Keys whose length is outside the lengths of the build set are rejected without touching the
    /// slots.
    #[inline]
    pub fn get_entry<Q: AsRef<[u8]> + ?Sized>(&self, key: &Q) -> Option<&KeyEntry> {
        let key = key.as_ref();
        let slot = self.inner.params.slot(key)?;
        self.inner
            .slots
            .get(slot)?
            .as_ref()
            .filter(|entry| entry.key() == key)
    }

    /// Check whether `key` belongs to the table.
    #[inline]
    pub fn contains<Q: AsRef<[u8]> + ?Sized>(&self, key: &Q) -> bool {
        self.get_entry(key).is_some()
    }

    /// Get the value associated with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyNotFound`] if `key` does not belong to the table.
    #[inline]
    pub fn get<Q: AsRef<[u8]> + ?Sized>(&self, key: &Q) -> Result<i64, KeyNotFound> {
        self.get_entry(key).map(KeyEntry::value).ok_or(KeyNotFound)
    }

    /// Get the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len
    }

    /// Check if the table is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of slots.
    ///
    /// This is at least [`len`](Self::len).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    /// Iterate through entries.
    ///
    /// The iteration order is by slot: unspecified, but constant for a given table.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &KeyEntry> {
        self.inner.slots.iter().flatten()
    }

    /// The hash function of the table.
    #[inline]
    #[must_use]
    pub const fn parameters(&self) -> &HashParameters {
        &self.inner.params
    }
}

impl<'a> IntoIterator for &'a PerfectHashTable {
    type Item = &'a KeyEntry;
    type IntoIter = core::iter::Flatten<core::slice::Iter<'a, Option<KeyEntry>>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.inner.slots.iter().flatten()
    }
}

/// Serialized as the bare parts, which is what deserialization validates.
#[cfg(feature = "serde")]
impl serde::Serialize for PerfectHashTable {
    #[inline]
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.inner, serializer)
    }
}

impl TryFrom<TableInner> for PerfectHashTable {
    type Error = ValidationError;

    #[inline]
    fn try_from(inner: TableInner) -> Result<Self, ValidationError> {
        inner.params.validate()?;

        if inner.slots.len() != inner.params.table_size() {
            return Err(ValidationError::WrongSlotCount);
        }

        if inner.len != inner.slots.iter().filter(|slot| slot.is_some()).count() {
            return Err(ValidationError::WrongLen);
        }

        // Since slots are a function of keys, entries in their own slots are also unique.
        for (index, slot) in inner.slots.iter().enumerate() {
            if let Some(entry) = slot {
                if !inner.params.key_lengths().contains(&entry.key().len()) {
                    return Err(ValidationError::KeyLengthOutOfBounds);
                }
                if inner.params.slot(entry.key()) != Some(index) {
                    return Err(ValidationError::MisplacedEntry);
                }
            }
        }

        Ok(Self { inner })
    }
}
