//! Table construction.

use super::{
    error::BuildError,
    hash::HashParameters,
    key_set::{Input, KeySet},
    search::search,
    table::PerfectHashTable,
};
use log::debug;

/// Default cap on the number of initially weighed byte positions.
///
/// Every weighed position costs a row of 256 weights, so without a cap the parameters of a table
/// grow with the length of its longest key.
pub const DEFAULT_MAX_POSITIONS: usize = 16;

/// Knobs of the hash function search.
///
/// The defaults suit most key sets. Any change in options, including the seed, may change the
/// resulting table, but equal options and equal input always produce equal tables.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct Options {
    /// Target ratio of keys to slots, in `(0, 1]`.
    ///
    /// The first attempt uses the smallest prime table size not below `keys / load_factor`.
    pub load_factor: f64,

    /// Weight repair rounds allowed per attempt.
    pub max_local_iterations: usize,

    /// Attempts allowed after the first one. Each grows the table.
    pub max_retries: usize,

    /// Table size multiplier applied by each retry, above 1.
    pub growth_factor: f64,

    /// Seed of the weight generator.
    pub seed: u64,

    /// Cap on the number of byte positions weighed initially. `None` weighs every position.
    ///
    /// Defaults to [`DEFAULT_MAX_POSITIONS`].
    ///
    /// Positions are chosen by how many distinct bytes the keys have there. More positions are
    /// added during the search if the chosen ones cannot tell some keys apart.
    pub max_positions: Option<usize>,
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self {
            load_factor: 1.0,
            max_local_iterations: 1000,
            max_retries: 10,
            growth_factor: 1.5,
            seed: 0x243f_6a88_85a3_08d3,
            max_positions: Some(DEFAULT_MAX_POSITIONS),
        }
    }
}

impl Options {
    /// Reject options the search cannot work with.
    fn validate(&self) -> Result<(), BuildError> {
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(BuildError::InvalidOptions("load factor must be in (0, 1]"));
        }
        if !(self.growth_factor > 1.0 && self.growth_factor.is_finite()) {
            return Err(BuildError::InvalidOptions(
                "growth factor must be finite and greater than 1",
            ));
        }
        if self.max_positions == Some(0) {
            return Err(BuildError::InvalidOptions("at least one position is required"));
        }
        Ok(())
    }
}

/// Builds [`PerfectHashTable`]s.
///
/// ```
/// use phdict::{Builder, Input};
///
/// let table = Builder::new()
///     .max_positions(Some(2))
///     .build(Input::Entries(vec![("GET", 1), ("PUT", 2), ("POST", 3)]))?;
/// assert_eq!(table.get("POST"), Ok(3));
/// # Ok::<(), phdict::BuildError>(())
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Builder {
    /// Search options.
    options: Options,
}

impl Builder {
    /// Create a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with the given options.
    #[inline]
    #[must_use]
    pub const fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Set [`Options::load_factor`].
    #[inline]
    #[must_use]
    pub const fn load_factor(mut self, load_factor: f64) -> Self {
        self.options.load_factor = load_factor;
        self
    }

    /// Set [`Options::max_local_iterations`].
    #[inline]
    #[must_use]
    pub const fn max_local_iterations(mut self, max_local_iterations: usize) -> Self {
        self.options.max_local_iterations = max_local_iterations;
        self
    }

    /// Set [`Options::max_retries`].
    #[inline]
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.options.max_retries = max_retries;
        self
    }

    /// Set [`Options::growth_factor`].
    #[inline]
    #[must_use]
    pub const fn growth_factor(mut self, growth_factor: f64) -> Self {
        self.options.growth_factor = growth_factor;
        self
    }

    /// Set [`Options::seed`].
    #[inline]
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    /// Set [`Options::max_positions`].
    #[inline]
    #[must_use]
    pub const fn max_positions(mut self, max_positions: Option<usize>) -> Self {
        self.options.max_positions = max_positions;
        self
    }

    /// The options in effect.
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Validate input and build a table.
    ///
    /// # Errors
    ///
    /// Fails if the options or the keys are invalid, or if no perfect hash function was found
    /// within the configured bounds.
    #[inline]
    pub fn build<K: AsRef<[u8]>>(
        &self,
        input: impl Into<Input<K>>,
    ) -> Result<PerfectHashTable, BuildError> {
        self.options.validate()?;
        self.build_key_set(KeySet::new(input.into())?)
    }

    /// Build a table from an already validated key set.
    ///
    /// # Errors
    ///
    /// Fails if the options are invalid, or if no perfect hash function was found within the
    /// configured bounds.
    #[expect(
        clippy::missing_inline_in_public_items,
        reason = "very heavy, we'd rather not copy it to every crate"
    )]
    pub fn build_key_set(&self, keys: KeySet) -> Result<PerfectHashTable, BuildError> {
        self.options.validate()?;
        let params = if keys.is_empty() {
            HashParameters::empty()
        } else {
            debug!(
                "building a table of {} keys, lengths {}..={}",
                keys.len(),
                keys.min_len(),
                keys.max_len(),
            );
            search(&keys, &self.options)?
        };
        Ok(PerfectHashTable::from_entries(params, keys.into_entries()))
    }
}

/// Build a table with the given options.
///
/// A shorthand for [`Builder::with_options`] followed by [`Builder::build`].
///
/// # Errors
///
/// Fails if the options or the keys are invalid, or if no perfect hash function was found within
/// the configured bounds.
#[inline]
pub fn construct<K: AsRef<[u8]>>(
    input: impl Into<Input<K>>,
    options: Options,
) -> Result<PerfectHashTable, BuildError> {
    Builder::with_options(options).build(input)
}
