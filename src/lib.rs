//! # Sim-LOB
//!
//! An in-memory price-time priority limit order book for agent-based market
//! simulation.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: One owner drives each book sequentially (no locks)
//! - **Arena Allocation**: Resting orders live in a pre-sized slab addressed
//!   by 32-bit indices; no allocation on the matching path
//! - **Dense Levels**: Prices map onto a fixed tick grid, one FIFO queue per tick
//! - **Reports, not errors**: Rejected orders surface as `invalid` execution reports
//!
//! ## Architecture
//!
//! ```text
//! [Agents] --> Command --> [Engine] --ticker--> [OrderBook] --> ExecutionReport
//!                                                   |
//!                              StaticOrderBook (arena + level table)
//!                              TreeOrderBook   (ordered maps)
//! ```

pub mod arena;
pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod order_book;
pub mod price;
pub mod price_level;
pub mod replay;
pub mod static_book;
pub mod tree_book;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, NULL_INDEX};
pub use codec::{LevelIndex, PriceCodec};
pub use command::{
    CancelOrder, Command, ExecutionReport, Lifetime, LimitOrder, OrderId, OwnerId, ReportState,
    Side, AGGRESSOR_ID,
};
pub use config::BookConfig;
pub use engine::Engine;
pub use error::{ArenaError, BookError, ReplayError};
pub use order_book::{DepthLevel, DepthSnapshot, OrderBook};
pub use price::{Currency, Price, Quote};
pub use price_level::{OrderNode, PriceLevel};
pub use replay::{OrderFlowRow, Replay, ReplaySummary};
pub use static_book::StaticOrderBook;
pub use tree_book::TreeOrderBook;
