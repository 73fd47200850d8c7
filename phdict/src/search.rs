//! Search for hash parameters that are perfect on a key set.
//!
//! Every attempt runs at a fixed table size with freshly generated weights and has two stages.
//!
//! 1. Weights are repaired until no two keys share both the bucket and the approximate slot. A
//!    colliding pair is separated by re-randomizing a weight that only one of the two keys uses. If
//!    the pair agrees on every selected byte, a byte where they differ is added to the selection.
//! 2. Buckets are placed largest first: each bucket gets the first displacement that moves all of
//!    its keys to free slots.
//!
//! Running out of repair rounds or of displacements fails the attempt, and the next attempt uses a
//! larger table and new weights. The number of attempts is bounded, so the search always
//! terminates.

#![allow(
    clippy::arithmetic_side_effects,
    reason = "indices are bounded by the key count and the table size, which fit in u32"
)]

use super::{
    bitmap::BitMap,
    builder::Options,
    error::BuildError,
    hash::{place, split, HashParameters, Positions, ROW_LEN},
    key_set::KeySet,
};
use alloc::{vec, vec::Vec};
use log::{debug, trace};
use rapidhash::RapidRng;

/// Expected number of keys per bucket.
const LAMBDA: usize = 2;

/// Find parameters under which every key of `keys` gets its own slot.
///
/// `keys` must not be empty and `options` must be valid.
pub(crate) fn search(keys: &KeySet, options: &Options) -> Result<HashParameters, BuildError> {
    let key_bytes: Vec<&[u8]> = keys.iter().map(|entry| entry.key()).collect();
    let positions = choose_positions(&key_bytes, keys.max_len(), options.max_positions);
    let plan = plan_attempts(key_bytes.len(), options);

    let Some(&(last_table_size, _)) = plan.last() else {
        return Err(BuildError::Construction {
            attempts: 0,
            table_size: key_bytes.len(),
        });
    };

    let run = |index: usize, table_size: u32, seed: u64| {
        debug!("attempt {index}: table size {table_size}");
        let result = Attempt::new(&key_bytes, keys, &positions, table_size, seed).run(options);
        if result.is_none() {
            debug!("attempt {index} at table size {table_size} failed");
        }
        result
    };

    #[cfg(feature = "rayon")]
    let found = {
        use rayon::prelude::*;
        plan.par_iter()
            .enumerate()
            .find_map_first(|(index, &(table_size, seed))| run(index, table_size, seed))
    };

    #[cfg(not(feature = "rayon"))]
    let found = plan
        .iter()
        .enumerate()
        .find_map(|(index, &(table_size, seed))| run(index, table_size, seed));

    found.ok_or(BuildError::Construction {
        attempts: plan.len(),
        table_size: last_table_size as usize,
    })
}

/// Compute `(table size, seed)` for each attempt.
///
/// The list is cut short if the table size would not fit in `u32`.
fn plan_attempts(key_count: usize, options: &Options) -> Vec<(u32, u64)> {
    #[expect(clippy::cast_precision_loss, reason = "only used as an estimate")]
    let mut table_size = next_prime(ceil(key_count as f64 / options.load_factor));
    let mut seeds = RapidRng::new(options.seed);
    let mut plan = Vec::new();
    while let Some(size) = table_size {
        plan.push((size, seeds.next()));
        if plan.len() > options.max_retries {
            break;
        }
        let grown = ceil(f64::from(size) * options.growth_factor).max(u64::from(size) + 1);
        table_size = next_prime(grown);
    }
    plan
}

/// Pick the byte offsets to weigh.
///
/// With a cap, the offsets with the most distinct byte values win, lower offsets breaking ties.
/// Running past the end of a key counts as one more distinct value.
fn choose_positions(keys: &[&[u8]], max_len: usize, max_positions: Option<usize>) -> Positions {
    let Some(cap) = max_positions.filter(|&cap| cap < max_len) else {
        return Positions::All;
    };

    // One 256-bit set of seen bytes per offset, plus whether some key ends before it.
    let mut seen = vec![([0u64; 4], false); max_len];
    for key in keys {
        for (offset, (bytes, absent)) in seen.iter_mut().enumerate() {
            match key.get(offset) {
                Some(&byte) => bytes[usize::from(byte / 64)] |= 1 << (byte % 64),
                None => *absent = true,
            }
        }
    }

    let mut ranked: Vec<(usize, u32)> = seen
        .iter()
        .enumerate()
        .map(|(offset, (bytes, absent))| {
            let distinct: u32 = bytes.iter().map(|word| word.count_ones()).sum();
            (offset, distinct + u32::from(*absent))
        })
        .collect();
    ranked.sort_by_key(|&(offset, distinct)| (core::cmp::Reverse(distinct), offset));
    ranked.truncate(cap);

    #[expect(clippy::cast_possible_truncation, reason = "keys are at most u16::MAX bytes long")]
    let mut offsets: Vec<u16> = ranked.iter().map(|&(offset, _)| offset as u16).collect();
    offsets.sort_unstable();
    Positions::Selected(offsets.into())
}

/// A single try at a fixed table size.
struct Attempt<'a> {
    /// The keys, in key set order.
    keys: &'a [&'a [u8]],

    /// Parameters being tuned. Displacements are filled in by placement.
    params: HashParameters,

    /// Source of fresh weights.
    rng: RapidRng,
}

/// A weight that can be re-randomized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Weight {
    /// Index into `weights`.
    Byte(usize),
    /// Index into `length_weights`, i.e. the key length minus the shortest length.
    Length(usize),
}

impl<'a> Attempt<'a> {
    /// Generate random weights for the given table size.
    fn new(
        keys: &'a [&'a [u8]],
        key_set: &KeySet,
        positions: &Positions,
        table_size: u32,
        seed: u64,
    ) -> Self {
        let mut rng = RapidRng::new(seed);
        let bucket_count = keys.len().div_ceil(LAMBDA).next_power_of_two().max(2);
        let rows = match positions {
            Positions::All => key_set.max_len(),
            Positions::Selected(offsets) => offsets.len(),
        };

        #[expect(clippy::cast_possible_truncation, reason = "keys are at most u16::MAX bytes long")]
        let params = HashParameters {
            positions: positions.clone(),
            weights: (0..rows * ROW_LEN).map(|_| rng.next()).collect(),
            length_weights: (key_set.min_len()..=key_set.max_len())
                .map(|_| rng.next())
                .collect(),
            table_size,
            bucket_shift: 64 - bucket_count.ilog2(),
            displacements: vec![0; bucket_count].into(),
            min_len: key_set.min_len() as u32,
            max_len: key_set.max_len() as u32,
        };

        Self { keys, params, rng }
    }

    /// Repair the weights, then place the buckets.
    fn run(mut self, options: &Options) -> Option<HashParameters> {
        let mut round = 0;
        let order = loop {
            let order = self.sorted_keys()?;
            let collisions: Vec<(usize, usize)> = order
                .windows(2)
                .filter(|pair| pair[0].0 == pair[1].0)
                .map(|pair| (pair[0].1, pair[1].1))
                .collect();
            if collisions.is_empty() {
                break order;
            }
            if round == options.max_local_iterations {
                debug!("weights still collide after {round} repair rounds");
                return None;
            }
            round += 1;
            trace!("repair round {round}: {} colliding pairs", collisions.len());
            for (a, b) in collisions {
                self.separate(a, b);
            }
        };

        self.place_buckets(&order)?;
        debug!(
            "found parameters: {} keys, table size {}, {} buckets, {round} repair rounds",
            self.keys.len(),
            self.params.table_size,
            self.params.displacements.len(),
        );
        Some(self.params)
    }

    /// Key indices sorted by `(bucket, approximate slot)`, packed into a `u64`.
    fn sorted_keys(&self) -> Option<Vec<(u64, usize)>> {
        let mut order = self
            .keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let (approx, bucket) = split(
                    self.params.signature(key)?,
                    self.params.table_size,
                    self.params.bucket_shift,
                );
                Some((((bucket as u64) << 32) | u64::from(approx), index))
            })
            .collect::<Option<Vec<_>>>()?;
        radsort::sort_by_key(&mut order, |&(packed, _)| packed);
        Some(order)
    }

    /// Change the weights so that keys `a` and `b` most likely stop colliding.
    fn separate(&mut self, a: usize, b: usize) {
        let (a, b) = (self.keys[a], self.keys[b]);
        let candidates = self.distinguishing_weights(a, b);
        if candidates.is_empty() {
            self.select_differing_position(a, b);
            return;
        }

        #[expect(clippy::cast_possible_truncation, reason = "the remainder fits in usize")]
        let pick = (self.rng.next() % candidates.len() as u64) as usize;
        match candidates[pick] {
            Weight::Byte(index) => self.params.weights[index] = self.rng.next(),
            Weight::Length(len) => self.params.length_weights[len] = self.rng.next(),
        }
    }

    /// Weights used by exactly one of the two keys.
    fn distinguishing_weights(&self, a: &[u8], b: &[u8]) -> Vec<Weight> {
        let mut candidates = Vec::new();
        if a.len() != b.len() {
            let min_len = self.params.min_len as usize;
            candidates.push(Weight::Length(a.len() - min_len));
            candidates.push(Weight::Length(b.len() - min_len));
        }

        let mut push_row = |row: usize, offset: usize| {
            let (x, y) = (a.get(offset), b.get(offset));
            if x != y {
                for byte in [x, y].into_iter().flatten() {
                    candidates.push(Weight::Byte(row * ROW_LEN + usize::from(*byte)));
                }
            }
        };
        match &self.params.positions {
            Positions::All => {
                for offset in 0..a.len().max(b.len()) {
                    push_row(offset, offset);
                }
            }
            Positions::Selected(offsets) => {
                for (row, &offset) in offsets.iter().enumerate() {
                    push_row(row, usize::from(offset));
                }
            }
        }
        candidates
    }

    /// Add the first unselected offset where `a` and `b` differ to the selection.
    ///
    /// The keys are distinct and, having no distinguishing weight, of equal length, so such an
    /// offset exists.
    fn select_differing_position(&mut self, a: &[u8], b: &[u8]) {
        let Positions::Selected(offsets) = &self.params.positions else {
            return;
        };
        let Some(offset) = a.iter().zip(b).position(|(x, y)| x != y) else {
            return;
        };
        #[expect(clippy::cast_possible_truncation, reason = "keys are at most u16::MAX bytes long")]
        let offset = offset as u16;
        let Err(row) = offsets.binary_search(&offset) else {
            return;
        };
        trace!("adding byte offset {offset} to the selection");

        let mut offsets = offsets.to_vec();
        offsets.insert(row, offset);
        let mut weights = core::mem::take(&mut self.params.weights).into_vec();
        let fresh: Vec<u64> = (0..ROW_LEN).map(|_| self.rng.next()).collect();
        weights.splice(row * ROW_LEN..row * ROW_LEN, fresh);

        self.params.positions = Positions::Selected(offsets.into());
        self.params.weights = weights.into();
    }

    /// Assign displacements, largest buckets first.
    ///
    /// `order` must be sorted by `(bucket, approximate slot)` without repeats.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the high half of a packed key is the bucket, the low half is the approx"
    )]
    fn place_buckets(&mut self, order: &[(u64, usize)]) -> Option<()> {
        // `by_size[size]` lists `(bucket, start)` of buckets with `size` keys.
        let mut by_size: Vec<Vec<(usize, usize)>> = Vec::new();
        let mut approxs = Vec::with_capacity(order.len());
        for group in order.chunk_by(|x, y| x.0 >> 32 == y.0 >> 32) {
            let bucket = (group[0].0 >> 32) as usize;
            let start = approxs.len();
            approxs.extend(group.iter().map(|&(packed, _)| packed as u32));
            if by_size.len() <= group.len() {
                by_size.resize_with(group.len() + 1, Vec::new);
            }
            by_size[group.len()].push((bucket, start));
        }

        let table_size = self.params.table_size;
        let mut taken = BitMap::new_zeros(table_size as usize);
        let mut displacements = vec![0; self.params.displacements.len()].into_boxed_slice();
        for (size, buckets) in by_size.iter().enumerate().rev() {
            for &(bucket, start) in buckets {
                let bucket_approxs = &approxs[start..start + size];
                let displacement = (0..table_size).find(|&displacement| {
                    bucket_approxs
                        .iter()
                        .all(|&approx| !taken.get(place(approx, displacement, table_size)))
                })?;
                for &approx in bucket_approxs {
                    taken.set(place(approx, displacement, table_size));
                }
                displacements[bucket] = displacement;
            }
        }

        self.params.displacements = displacements;
        Some(())
    }
}

/// Round a non-negative float up to an integer, saturating.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "saturating float conversions are intended"
)]
fn ceil(x: f64) -> u64 {
    let truncated = x as u64;
    if (truncated as f64) < x {
        truncated.saturating_add(1)
    } else {
        truncated
    }
}

/// Find the smallest prime not below `from`, if it fits in `u32`.
fn next_prime(from: u64) -> Option<u32> {
    let first = u32::try_from(from.max(2)).ok()?;
    (first..=u32::MAX).find(|&candidate| is_prime(candidate))
}

/// Trial division primality test.
fn is_prime(n: u32) -> bool {
    let n = u64::from(n);
    n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}
