//! Validated key sets.

use super::error::{BuildError, InvalidKeyReason};
use alloc::{borrow::ToOwned, boxed::Box, collections::BTreeMap, string::String, vec::Vec};

/// Longest supported key. Byte positions are stored as `u16`.
pub(crate) const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Keys supplied to the builder.
///
/// Either an ordered list of keys, whose values are their positions, or an explicit list of
/// key-value pairs. Both are normalized into a [`KeySet`] before the search starts.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Input<K> {
    /// Ordered keys, valued by their 0-based position.
    ///
    /// A repeated key is not an error: the position of its *last* occurrence becomes its value.
    Keys(Vec<K>),

    /// Explicit key-value pairs.
    ///
    /// A repeated key is tolerated only if it repeats the same value.
    Entries(Vec<(K, i64)>),
}

impl<K> From<Vec<K>> for Input<K> {
    #[inline]
    fn from(keys: Vec<K>) -> Self {
        Self::Keys(keys)
    }
}

impl<K, const N: usize> From<[K; N]> for Input<K> {
    #[inline]
    fn from(keys: [K; N]) -> Self {
        Self::Keys(keys.into())
    }
}

impl<K> From<BTreeMap<K, i64>> for Input<K> {
    #[inline]
    fn from(map: BTreeMap<K, i64>) -> Self {
        Self::Entries(map.into_iter().collect())
    }
}

/// Entries are sorted by key so that the build does not depend on the map's iteration order.
#[cfg(feature = "std")]
impl<K: AsRef<[u8]>, S> From<std::collections::HashMap<K, i64, S>> for Input<K> {
    #[inline]
    fn from(map: std::collections::HashMap<K, i64, S>) -> Self {
        let mut entries: Vec<(K, i64)> = map.into_iter().collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.as_ref().cmp(b.as_ref()));
        Self::Entries(entries)
    }
}

/// A key together with its value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyEntry {
    /// Key bytes, never empty.
    key: Box<[u8]>,

    /// The associated value.
    value: i64,
}

impl KeyEntry {
    /// Pair a key with a value. The key is not validated.
    pub(crate) const fn new(key: Box<[u8]>, value: i64) -> Self {
        Self { key, value }
    }

    /// The key bytes.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &[u8] {
        &self.key
    }

    /// The value associated with the key.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }
}

/// A validated set of unique, non-empty keys with their values.
///
/// The order of entries follows the input and only serves to make builds reproducible.
#[derive(Clone, Debug, Default)]
pub struct KeySet {
    /// Unique entries in input order.
    entries: Vec<KeyEntry>,

    /// Length of the shortest key, 0 if the set is empty.
    min_len: usize,

    /// Length of the longest key, 0 if the set is empty.
    max_len: usize,
}

impl KeySet {
    /// Validate and normalize input.
    ///
    /// # Errors
    ///
    /// Fails with [`BuildError::InvalidKey`] on an empty or overly long key, and with
    /// [`BuildError::DuplicateKey`] if [`Input::Entries`] repeats a key with another value.
    #[inline]
    pub fn new<K: AsRef<[u8]>>(input: Input<K>) -> Result<Self, BuildError> {
        let mut collector = Collector::default();
        match &input {
            Input::Keys(keys) => {
                for (index, key) in keys.iter().enumerate() {
                    #[allow(clippy::cast_possible_wrap, reason = "Vec indices fit in isize")]
                    collector.insert(index, key.as_ref(), index as i64, Repeat::Overwrite)?;
                }
            }
            Input::Entries(entries) => {
                for (index, (key, value)) in entries.iter().enumerate() {
                    collector.insert(index, key.as_ref(), *value, Repeat::MustMatch)?;
                }
            }
        }
        Ok(collector.finish())
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in input order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Iterate through entries in input order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &KeyEntry> {
        self.entries.iter()
    }

    /// Length of the shortest key, or 0 for an empty set.
    #[inline]
    #[must_use]
    pub const fn min_len(&self) -> usize {
        self.min_len
    }

    /// Length of the longest key, or 0 for an empty set.
    #[inline]
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Take the entries out.
    pub(crate) fn into_entries(self) -> Vec<KeyEntry> {
        self.entries
    }
}

/// How a repeated key is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repeat {
    /// The later value replaces the earlier one.
    Overwrite,
    /// The values must be equal.
    MustMatch,
}

/// Accumulates unique entries while remembering where each key was stored.
#[derive(Default)]
struct Collector<'a> {
    /// Unique entries in order of first occurrence.
    entries: Vec<KeyEntry>,
    /// Key to index into `entries`.
    seen: BTreeMap<&'a [u8], usize>,
}

impl<'a> Collector<'a> {
    /// Add an entry, resolving repeats according to `repeat`.
    fn insert(
        &mut self,
        index: usize,
        key: &'a [u8],
        value: i64,
        repeat: Repeat,
    ) -> Result<(), BuildError> {
        if key.is_empty() {
            return Err(BuildError::InvalidKey {
                index,
                reason: InvalidKeyReason::Empty,
            });
        }
        if key.len() > MAX_KEY_LEN {
            return Err(BuildError::InvalidKey {
                index,
                reason: InvalidKeyReason::TooLong { len: key.len() },
            });
        }

        if let Some(&existing) = self.seen.get(key) {
            let entry = &mut self.entries[existing];
            match repeat {
                Repeat::Overwrite => entry.value = value,
                Repeat::MustMatch if entry.value == value => {}
                Repeat::MustMatch => {
                    return Err(BuildError::DuplicateKey {
                        key: String::from_utf8_lossy(key).into_owned(),
                        first: entry.value,
                        second: value,
                    });
                }
            }
            return Ok(());
        }

        self.seen.insert(key, self.entries.len());
        self.entries.push(KeyEntry::new(key.to_owned().into_boxed_slice(), value));
        Ok(())
    }

    /// Produce the key set.
    fn finish(self) -> KeySet {
        let lens = self.entries.iter().map(|entry| entry.key.len());
        KeySet {
            min_len: lens.clone().min().unwrap_or(0),
            max_len: lens.max().unwrap_or(0),
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn pairs(set: &KeySet) -> Vec<(&[u8], i64)> {
        set.iter().map(|entry| (entry.key(), entry.value())).collect()
    }

    #[test]
    fn keys_are_valued_by_position() {
        let set = KeySet::new(Input::from(["one", "two", "three"])).unwrap();
        assert_eq!(
            pairs(&set),
            vec![(&b"one"[..], 0), (&b"two"[..], 1), (&b"three"[..], 2)]
        );
        assert_eq!(set.min_len(), 3);
        assert_eq!(set.max_len(), 5);
    }

    #[test]
    fn repeated_key_takes_last_position() {
        let set = KeySet::new(Input::from(vec!["a", "b", "a", "c"])).unwrap();
        assert_eq!(
            pairs(&set),
            vec![(&b"a"[..], 2), (&b"b"[..], 1), (&b"c"[..], 3)]
        );
    }

    #[test]
    fn repeated_entry_with_same_value_is_merged() {
        let set = KeySet::new(Input::Entries(vec![("x", 5), ("y", 6), ("x", 5)])).unwrap();
        assert_eq!(pairs(&set), vec![(&b"x"[..], 5), (&b"y"[..], 6)]);
    }

    #[test]
    fn repeated_entry_with_other_value_fails() {
        assert_eq!(
            KeySet::new(Input::Entries(vec![("x", 5), ("y", 6), ("x", 7)])).unwrap_err(),
            BuildError::DuplicateKey {
                key: "x".into(),
                first: 5,
                second: 7,
            }
        );
    }

    #[test]
    fn keys_are_case_sensitive() {
        let set = KeySet::new(Input::Entries(vec![("Key", 1), ("key", 2)])).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn invalid_keys() {
        assert_eq!(
            KeySet::new(Input::from(vec!["ok", ""])).unwrap_err(),
            BuildError::InvalidKey {
                index: 1,
                reason: InvalidKeyReason::Empty,
            }
        );

        let long = vec![b'z'; MAX_KEY_LEN + 1];
        assert_eq!(
            KeySet::new(Input::from(vec![long])).unwrap_err(),
            BuildError::InvalidKey {
                index: 0,
                reason: InvalidKeyReason::TooLong {
                    len: MAX_KEY_LEN + 1
                },
            }
        );
    }

    #[test]
    fn empty_input() {
        let set = KeySet::new(Input::<&str>::Keys(Vec::new())).unwrap();
        assert!(set.is_empty());
        assert_eq!((set.min_len(), set.max_len()), (0, 0));
    }

    #[cfg(feature = "std")]
    #[test]
    fn hash_map_input_is_sorted() {
        let map: std::collections::HashMap<&str, i64> =
            [("c", 3), ("a", 1), ("b", 2)].into_iter().collect();
        let set = KeySet::new(Input::from(map)).unwrap();
        assert_eq!(
            pairs(&set),
            vec![(&b"a"[..], 1), (&b"b"[..], 2), (&b"c"[..], 3)]
        );
    }
}
