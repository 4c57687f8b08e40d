//! Command and report types for the matching engine.
//!
//! Commands are inputs from the simulation (place or cancel).
//! Execution reports are the outputs routed back to agents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::price::Quote;

/// Identifier of a resting order, as carried by its placement report.
pub type OrderId = u64;

/// Identity of the agent that owns an order.
pub type OwnerId = u64;

/// Identifier carried by the incoming side of a match; no resting order has it.
pub const AGGRESSOR_ID: OrderId = u64::MAX;

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    #[serde(alias = "bid")]
    Buy = 0,
    /// Sell side (asks)
    #[serde(alias = "ask")]
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

/// How long unmatched quantity may stay in the book.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Rest the remainder until cancelled
    #[default]
    #[serde(alias = "gtc")]
    GoodUntilCancelled,
    /// Fill completely on arrival or not at all
    #[serde(alias = "fok")]
    FillOrKill,
    /// Fill what crosses on arrival, cancel the rest
    #[serde(alias = "ioc")]
    ImmediateOrCancel,
}

// ============================================================================
// Input Commands
// ============================================================================

/// A limit order submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitOrder {
    pub ticker: String,
    pub owner: OwnerId,
    pub side: Side,
    /// Worst acceptable price
    pub limit: Quote,
    pub quantity: u32,
    pub lifetime: Lifetime,
}

impl LimitOrder {
    pub fn new(
        ticker: impl Into<String>,
        owner: OwnerId,
        side: Side,
        limit: Quote,
        quantity: u32,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            owner,
            side,
            limit,
            quantity,
            lifetime,
        }
    }

    /// Whether a resting order at `resting` can trade against this order.
    #[inline]
    pub fn crosses(&self, resting: &Quote) -> bool {
        match self.side {
            // Buyer willing to pay >= lowest ask
            Side::Buy => resting <= &self.limit,
            // Seller willing to accept <= highest bid
            Side::Sell => resting >= &self.limit,
        }
    }
}

/// Cancel a resting order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelOrder {
    pub ticker: String,
    pub order_id: OrderId,
}

/// Input commands to an [`Engine`](crate::engine::Engine)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Submit a limit order
    Place(LimitOrder),
    /// Cancel a resting order
    Cancel(CancelOrder),
}

impl Command {
    pub fn ticker(&self) -> &str {
        match self {
            Command::Place(order) => &order.ticker,
            Command::Cancel(cancel) => &cancel.ticker,
        }
    }
}

// ============================================================================
// Output Reports
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportState {
    /// Order rejected, nothing admitted
    Invalid,
    /// Resting order or unmatched remainder removed
    Cancel,
    /// Quantity executed
    Match,
    /// Remainder now resting
    Placement,
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportState::Invalid => "invalid",
            ReportState::Cancel => "cancel",
            ReportState::Match => "match",
            ReportState::Placement => "placement",
        })
    }
}

/// A state change of one order, appended to the book's report stream.
///
/// A match produces a pair: the aggressor's report carries [`AGGRESSOR_ID`],
/// the resting order's report carries its identifier. Both are priced at the
/// resting order's limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub state: ReportState,
    pub side: Side,
    pub quantity: u32,
    pub identifier: OrderId,
    pub limit: Quote,
    pub owner: OwnerId,
}

impl ExecutionReport {
    /// Whether this report describes the incoming order rather than a resting one.
    #[inline]
    pub fn is_aggressor(&self) -> bool {
        self.identifier == AGGRESSOR_ID
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x {} owner={}",
            self.state, self.side, self.quantity, self.limit, self.owner
        )?;
        if !self.is_aggressor() {
            write!(f, " id={}", self.identifier)?;
        }
        Ok(())
    }
}
