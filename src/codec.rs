//! Price Codec - maps quotes on a tick grid to dense level indices.
//!
//! The grid spans `[lower, upper]` in steps of `tick` minor units. Encoding is
//! the affine map `(q - lower) / (upper - lower) * (levels - 1)`, done in
//! integers so that `decode(encode(q)) == q` for every quote on the grid.

use crate::error::BookError;
use crate::price::Quote;

/// Index into a price-level table; 0 is the lowest admissible price.
pub type LevelIndex = u32;

/// Upper bound on the number of levels a dense table may have.
///
/// Tables are allocated eagerly at 24 bytes per level, so this caps a single
/// book at roughly 96 MiB of levels whatever a config file asks for.
pub const MAX_LEVELS: u64 = 1 << 22;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceCodec {
    lower: Quote,
    upper: Quote,
    tick: u64,
    levels: u32,
}

impl PriceCodec {
    /// Build a codec for `[lower, upper]` with a step of `tick` minor units.
    ///
    /// # Errors
    /// Fails if the lot is zero, if the bounds differ in valuation or lot, if `lower >= upper`,
    /// if `tick` is zero or does not divide the range, or if the range needs
    /// more than [`MAX_LEVELS`] levels.
    pub fn new(lower: Quote, upper: Quote, tick: u64) -> Result<Self, BookError> {
        if lower.lot == 0 {
            return Err(BookError::ZeroLot);
        }
        if !lower.is_comparable(&upper) {
            return Err(BookError::MismatchedGranularity {
                minimum: lower,
                maximum: upper,
            });
        }
        if lower.value() >= upper.value() {
            return Err(BookError::EmptyRange {
                minimum: lower,
                maximum: upper,
            });
        }

        let span = (i128::from(upper.value()) - i128::from(lower.value())) as u64;
        if tick == 0 || span % tick != 0 {
            return Err(BookError::MisalignedTick { tick, span });
        }

        // +1 because the maximum value is included
        let levels = span / tick + 1;
        if levels > MAX_LEVELS {
            return Err(BookError::TooManyLevels {
                levels,
                max: MAX_LEVELS,
            });
        }

        Ok(Self {
            lower,
            upper,
            tick,
            levels: levels as u32,
        })
    }

    #[inline]
    pub fn lower(&self) -> Quote {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> Quote {
        self.upper
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Whether the quote shares the grid's valuation and lot.
    #[inline]
    pub fn accepts(&self, quote: &Quote) -> bool {
        quote.is_comparable(&self.lower)
    }

    /// Whether the quote lies within `[lower, upper]`.
    #[inline]
    pub fn contains(&self, quote: &Quote) -> bool {
        self.accepts(quote)
            && self.lower.value() <= quote.value()
            && quote.value() <= self.upper.value()
    }

    /// Whether the quote lies on a tick of the grid.
    #[inline]
    pub fn is_aligned(&self, quote: &Quote) -> bool {
        let offset = i128::from(quote.value()) - i128::from(self.lower.value());
        offset.rem_euclid(i128::from(self.tick)) == 0
    }

    /// Map a quote to its level, or `None` if it is off the grid.
    pub fn encode(&self, quote: &Quote) -> Option<LevelIndex> {
        if !self.contains(quote) || !self.is_aligned(quote) {
            return None;
        }
        let offset = i128::from(quote.value()) - i128::from(self.lower.value());
        let index = offset * i128::from(self.levels - 1) / self.span();
        Some(index as LevelIndex)
    }

    /// Map a level back to its quote.
    pub fn decode(&self, index: LevelIndex) -> Quote {
        debug_assert!(index < self.levels, "level {index} beyond the table");
        let offset = i128::from(index) * self.span() / i128::from(self.levels - 1);
        self.lower.with_value((i128::from(self.lower.value()) + offset) as i64)
    }

    #[inline]
    fn span(&self) -> i128 {
        i128::from(self.upper.value()) - i128::from(self.lower.value())
    }
}
