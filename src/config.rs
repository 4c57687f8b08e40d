//! Book configuration - picks a book variant per instrument.

use serde::{Deserialize, Serialize};

use crate::error::BookError;
use crate::order_book::OrderBook;
use crate::price::{Currency, Quote};
use crate::static_book::StaticOrderBook;
use crate::tree_book::TreeOrderBook;

/// Default number of resting orders a static book can hold.
pub const DEFAULT_CAPACITY: u64 = 128 * 1024;

fn default_tick() -> u64 {
    1
}

fn default_capacity() -> u64 {
    DEFAULT_CAPACITY
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookConfig {
    /// Dense level table over `[minimum, maximum]`; fastest, bounded range.
    Static {
        minimum: Quote,
        maximum: Quote,
        #[serde(default = "default_tick")]
        tick: u64,
        #[serde(default = "default_capacity")]
        capacity: u64,
    },
    /// Ordered maps; any price in the given valuation and lot.
    Tree { valuation: Currency, lot: u64 },
}

impl BookConfig {
    /// A static book with the default tick and capacity.
    pub fn bounded(minimum: Quote, maximum: Quote) -> Self {
        BookConfig::Static {
            minimum,
            maximum,
            tick: default_tick(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Valuation and lot every order on this book must be quoted in.
    pub fn unit(&self) -> (Currency, u64) {
        match *self {
            BookConfig::Static { minimum, .. } => (minimum.price.valuation, minimum.lot),
            BookConfig::Tree { valuation, lot } => (valuation, lot),
        }
    }

    /// # Errors
    /// Whatever the chosen variant's constructor rejects.
    pub fn build(&self) -> Result<Box<dyn OrderBook + Send>, BookError> {
        Ok(match *self {
            BookConfig::Static {
                minimum,
                maximum,
                tick,
                capacity,
            } => Box::new(StaticOrderBook::with_tick(minimum, maximum, tick, capacity)?),
            BookConfig::Tree { valuation, lot } => Box::new(TreeOrderBook::new(valuation, lot)?),
        })
    }
}
