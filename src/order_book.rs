//! Order Book - the capability set shared by every book variant.
//!
//! [`StaticOrderBook`](crate::static_book::StaticOrderBook) keeps a dense
//! level table over a bounded price range; [`TreeOrderBook`](crate::tree_book::TreeOrderBook)
//! keeps ordered maps and accepts any price. Callers pick one per instrument
//! and drive it through this trait.

use std::fmt;

use crate::command::{ExecutionReport, LimitOrder, OrderId};
use crate::error::BookError;
use crate::price::Quote;

/// A limit order book for one instrument.
///
/// Books are not synchronized: one owner issues operations sequentially and
/// drains the report stream between them.
pub trait OrderBook {
    /// Best (highest) resting buy price
    fn bid(&self) -> Option<Quote>;

    /// Best (lowest) resting sell price
    fn ask(&self) -> Option<Quote>;

    /// Submit an order: match what crosses, then rest, kill or cancel the
    /// remainder according to its lifetime.
    ///
    /// Rejected orders are reported as `invalid` and return `Ok`.
    ///
    /// # Errors
    /// [`BookError::Arena`] if the remainder could not be stored. Its
    /// quantity is reported as cancelled.
    fn insert(&mut self, order: &LimitOrder) -> Result<(), BookError>;

    /// Remove a resting order, reporting its remaining quantity as cancelled.
    ///
    /// # Errors
    /// [`BookError::UnknownOrder`] if no live order has this identifier.
    fn cancel(&mut self, order_id: OrderId) -> Result<(), BookError>;

    /// Reports accumulated since the last drain.
    fn reports(&self) -> &[ExecutionReport];

    /// Drain the report stream.
    fn take_reports(&mut self) -> Vec<ExecutionReport>;

    fn clear_reports(&mut self) {
        self.take_reports();
    }

    /// Identifiers of all resting orders.
    fn orders(&self) -> Vec<OrderId>;

    /// Number of resting orders.
    fn order_count(&self) -> usize;

    /// Total quantity resting on both sides.
    fn resting_quantity(&self) -> u64;

    /// The best `levels` aggregated price levels of each side.
    fn depth(&self, levels: usize) -> DepthSnapshot;

    /// Difference between best ask and best bid, in price units.
    fn spread(&self) -> Option<i64> {
        Some(self.ask()?.value() - self.bid()?.value())
    }
}

/// Aggregated interest at one price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthLevel {
    pub price: Quote,
    pub quantity: u64,
    pub orders: u32,
}

/// Best levels of both sides, each ordered from the touch outward.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepthSnapshot {
    /// Highest price first
    pub bids: Vec<DepthLevel>,
    /// Lowest price first
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Renders a ladder: asks above bids, each with the highest price on top.
impl fmt::Display for DepthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>15} | {:^14} | {:<15}", "bid", "price", "ask")?;
        for level in self.asks.iter().rev() {
            writeln!(
                f,
                "{:>15} | {:<14} | {:<15}",
                "",
                format_price(&level.price),
                level.quantity
            )?;
        }
        for level in &self.bids {
            writeln!(
                f,
                "{:>15} | {:<14} | {:<15}",
                level.quantity,
                format_price(&level.price),
                ""
            )?;
        }
        Ok(())
    }
}

fn format_price(quote: &Quote) -> String {
    let places = quote.price.valuation.decimals();
    format!("{:.*}", places, quote.price.as_f64())
}
