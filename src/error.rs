//! Error types for the arena, the books and order-flow replay.
//!
//! Rejected orders are never errors: they surface as `invalid` execution
//! reports. These types cover construction failures, capacity exhaustion
//! and caller misuse.

use thiserror::Error;

use crate::command::OrderId;
use crate::price::Quote;

/// Failure to allocate from an [`Arena`](crate::arena::Arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Every slot is occupied.
    #[error("arena at capacity ({capacity} slots)")]
    CapacityExceeded { capacity: u32 },
}

/// Errors raised by order books and the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("invalid limits: minimum {minimum} is not below maximum {maximum}")]
    EmptyRange { minimum: Quote, maximum: Quote },

    #[error("minimum {minimum} and maximum {maximum} differ in valuation or lot")]
    MismatchedGranularity { minimum: Quote, maximum: Quote },

    #[error("tick {tick} does not divide the price range of {span} units")]
    MisalignedTick { tick: u64, span: u64 },

    #[error("price range needs {levels} levels, at most {max} are supported")]
    TooManyLevels { levels: u64, max: u64 },

    #[error("a book needs a positive lot")]
    ZeroLot,

    #[error("capacity {0} is not a usable arena size")]
    InvalidCapacity(u64),

    #[error("unknown order identifier {0}")]
    UnknownOrder(OrderId),

    #[error("unknown instrument {0:?}")]
    UnknownTicker(String),

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Errors raised while reading an order-flow file.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("row {row}: missing field `{field}`")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: unknown action {action:?}")]
    UnknownAction { row: usize, action: String },

    #[error("row {row}: price {price} is not representable in minor units")]
    UnrepresentablePrice { row: usize, price: rust_decimal::Decimal },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
