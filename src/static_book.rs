//! Static Order Book - dense level table over a bounded price range.
//!
//! Implements the cross/rest algorithm:
//! 1. CROSSING: Match aggressive orders against the opposite side
//! 2. RESTING: Place remaining quantity in the book
//!
//! Both sides share one table of [`PriceLevel`]s indexed by
//! [`PriceCodec`] level. A level never holds both sides at once: an order
//! only rests after consuming everything it crosses, so every bid level lies
//! below every ask level. `best_bid` and `best_ask` track the touch; with no
//! interest on a side they sit on the table boundary.
//!
//! Resting orders live in an [`Arena`] sized at construction, so the hot path
//! never allocates besides pushing reports.

use tracing::{debug, trace, warn};

use crate::arena::{Arena, NULL_INDEX};
use crate::codec::{LevelIndex, PriceCodec};
use crate::command::{
    ExecutionReport, Lifetime, LimitOrder, OrderId, ReportState, Side, AGGRESSOR_ID,
};
use crate::error::BookError;
use crate::order_book::{DepthLevel, DepthSnapshot, OrderBook};
use crate::price::Quote;
use crate::price_level::{OrderNode, PriceLevel};

pub struct StaticOrderBook {
    /// Resting order records
    arena: Arena<OrderNode>,
    /// One FIFO queue per admissible price, lowest price first
    levels: Vec<PriceLevel>,
    codec: PriceCodec,
    /// Highest level with resting buys, or 0
    best_bid: LevelIndex,
    /// Lowest level with resting sells, or the top level
    best_ask: LevelIndex,
    reports: Vec<ExecutionReport>,
    resting_qty: u64,
}

impl StaticOrderBook {
    /// Create a book for `[minimum, maximum]` at a tick of one price unit.
    ///
    /// # Errors
    /// See [`StaticOrderBook::with_tick`].
    pub fn new(minimum: Quote, maximum: Quote, capacity: u64) -> Result<Self, BookError> {
        Self::with_tick(minimum, maximum, 1, capacity)
    }

    /// Create a book for `[minimum, maximum]` in steps of `tick` price units,
    /// holding at most `capacity` resting orders.
    ///
    /// # Errors
    /// Any [`PriceCodec::new`] failure, or [`BookError::InvalidCapacity`] if
    /// `capacity` is zero or cannot be addressed by an arena index.
    pub fn with_tick(
        minimum: Quote,
        maximum: Quote,
        tick: u64,
        capacity: u64,
    ) -> Result<Self, BookError> {
        let codec = PriceCodec::new(minimum, maximum, tick)?;
        if capacity == 0 || capacity >= u64::from(NULL_INDEX) {
            return Err(BookError::InvalidCapacity(capacity));
        }

        let levels = codec.levels();
        Ok(Self {
            arena: Arena::new(capacity as u32),
            levels: vec![PriceLevel::new(); levels as usize],
            codec,
            best_bid: 0,
            best_ask: levels - 1,
            reports: Vec::new(),
            resting_qty: 0,
        })
    }

    #[inline]
    pub fn codec(&self) -> &PriceCodec {
        &self.codec
    }

    /// Maximum number of resting orders.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.arena.capacity()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Level of the order's limit, or `None` (with the reason logged) if the
    /// order must be rejected.
    fn validate(&self, order: &LimitOrder) -> Option<LevelIndex> {
        if order.quantity == 0 {
            warn!(owner = order.owner, "rejecting order with zero quantity");
            return None;
        }
        if !self.codec.accepts(&order.limit) {
            warn!(
                owner = order.owner,
                limit = %order.limit,
                expected = %self.codec.lower(),
                "rejecting order quoted in another valuation or lot"
            );
            return None;
        }
        if !self.codec.contains(&order.limit) {
            warn!(
                owner = order.owner,
                limit = %order.limit,
                lower = %self.codec.lower(),
                upper = %self.codec.upper(),
                "rejecting order outside the price range"
            );
            return None;
        }
        if !self.codec.is_aligned(&order.limit) {
            warn!(
                owner = order.owner,
                limit = %order.limit,
                tick = self.codec.tick(),
                "rejecting order off the tick grid"
            );
            return None;
        }
        self.codec.encode(&order.limit)
    }

    /// Report about the incoming order itself.
    #[inline]
    fn aggressor_report(order: &LimitOrder, state: ReportState, quantity: u32) -> ExecutionReport {
        ExecutionReport {
            state,
            side: order.side,
            quantity,
            identifier: AGGRESSOR_ID,
            limit: order.limit,
            owner: order.owner,
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Side of the orders resting at `level`, if any.
    #[inline]
    fn level_side(&self, level: LevelIndex) -> Option<Side> {
        let head = self.levels[level as usize].peek_head();
        (head != NULL_INDEX).then(|| self.arena[head].side)
    }

    #[inline]
    fn best_level(&self, side: Side) -> Option<LevelIndex> {
        let cursor = match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
        };
        (self.level_side(cursor) == Some(side)).then_some(cursor)
    }

    /// Best level an incoming order on `side` could trade against.
    #[inline]
    fn best_opposite(&self, side: Side) -> Option<LevelIndex> {
        self.best_level(side.opposite())
    }

    /// Whether an incoming order at `limit` can trade against `level`.
    #[inline]
    fn crosses(side: Side, limit: LevelIndex, level: LevelIndex) -> bool {
        match side {
            Side::Buy => level <= limit,
            Side::Sell => level >= limit,
        }
    }

    /// Move `best_ask` up to the next level with interest, or the top.
    fn advance_best_ask(&mut self) {
        let top = self.codec.levels() - 1;
        while self.best_ask < top && self.levels[self.best_ask as usize].is_empty() {
            self.best_ask += 1;
        }
    }

    /// Move `best_bid` down to the next level with interest, or the bottom.
    fn retreat_best_bid(&mut self) {
        while self.best_bid > 0 && self.levels[self.best_bid as usize].is_empty() {
            self.best_bid -= 1;
        }
    }

    /// Keep the cursors on interest after `level`, which held `side`, emptied.
    #[inline]
    fn level_emptied(&mut self, level: LevelIndex, side: Side) {
        match side {
            Side::Buy if level == self.best_bid => self.retreat_best_bid(),
            Side::Sell if level == self.best_ask => self.advance_best_ask(),
            _ => {}
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Whether the opposite side holds at least `quantity` within `limit`.
    fn fillable(&self, side: Side, limit: LevelIndex, quantity: u32) -> bool {
        let Some(start) = self.best_opposite(side) else {
            return false;
        };
        if !Self::crosses(side, limit, start) {
            return false;
        }
        let range = match side {
            Side::Buy => start as usize..=limit as usize,
            Side::Sell => limit as usize..=start as usize,
        };
        let available: u64 = self.levels[range].iter().map(|l| l.total_qty).sum();
        available >= u64::from(quantity)
    }

    /// Cross (match) an incoming order against the opposite side.
    ///
    /// # Returns
    /// Remaining quantity after matching
    fn cross_order(&mut self, order: &LimitOrder, limit: LevelIndex) -> u32 {
        let mut remaining_qty = order.quantity;

        while remaining_qty > 0 {
            let Some(level) = self.best_opposite(order.side) else {
                break; // No orders on opposite side
            };
            if !Self::crosses(order.side, limit, level) {
                break;
            }
            remaining_qty = self.match_at_level(order, level, remaining_qty);
        }

        remaining_qty
    }

    /// Match against the orders at one level, oldest first.
    ///
    /// # Returns
    /// Remaining quantity after matching at this level
    fn match_at_level(
        &mut self,
        taker: &LimitOrder,
        level: LevelIndex,
        mut remaining_qty: u32,
    ) -> u32 {
        let price = self.codec.decode(level);
        let slot = level as usize;

        while remaining_qty > 0 {
            let maker_idx = self.levels[slot].peek_head();
            if maker_idx == NULL_INDEX {
                break;
            }

            let maker = self.arena[maker_idx];
            let maker_id = self.arena.key(maker_idx);
            let trade_qty = remaining_qty.min(maker.qty);
            trace!(
                price = %price,
                quantity = trade_qty,
                maker = maker_id,
                taker_owner = taker.owner,
                "match"
            );

            // Both legs execute at the resting order's price
            self.reports.push(ExecutionReport {
                limit: price,
                ..Self::aggressor_report(taker, ReportState::Match, trade_qty)
            });
            self.reports.push(ExecutionReport {
                state: ReportState::Match,
                side: maker.side,
                quantity: trade_qty,
                identifier: maker_id,
                limit: price,
                owner: maker.owner,
            });

            remaining_qty -= trade_qty;
            self.resting_qty -= u64::from(trade_qty);

            if trade_qty == maker.qty {
                // Maker fully filled - remove from book
                self.levels[slot].pop_front(&mut self.arena);
                self.arena.remove(maker_idx);
            } else {
                self.arena[maker_idx].qty -= trade_qty;
                self.levels[slot].subtract_qty(trade_qty);
            }
        }

        if self.levels[slot].is_empty() {
            self.level_emptied(level, taker.side.opposite());
        }

        remaining_qty
    }

    /// Rest the unmatched remainder in the book (passive posting).
    fn rest_order(
        &mut self,
        order: &LimitOrder,
        level: LevelIndex,
        qty: u32,
    ) -> Result<(), BookError> {
        let node = OrderNode::new(qty, order.owner, order.side, level);
        let index = match self.arena.insert(node) {
            Ok((index, _)) => index,
            Err(error) => {
                warn!(
                    owner = order.owner,
                    quantity = qty,
                    %error,
                    "no room to rest order, cancelling remainder"
                );
                self.reports
                    .push(Self::aggressor_report(order, ReportState::Cancel, qty));
                return Err(error.into());
            }
        };

        self.levels[level as usize].push_back(&mut self.arena, index);
        self.resting_qty += u64::from(qty);

        match order.side {
            Side::Buy if level > self.best_bid => self.best_bid = level,
            Side::Sell if level < self.best_ask => self.best_ask = level,
            _ => {}
        }

        let identifier = self.arena.key(index);
        debug!(
            id = identifier,
            side = %order.side,
            quantity = qty,
            limit = %order.limit,
            "order placed"
        );
        self.reports.push(ExecutionReport {
            identifier,
            ..Self::aggressor_report(order, ReportState::Placement, qty)
        });
        Ok(())
    }

    fn collect_depth(&self, side: Side, levels: usize) -> Vec<DepthLevel> {
        let level_at = |index: LevelIndex| {
            let level = &self.levels[index as usize];
            (self.level_side(index) == Some(side)).then(|| DepthLevel {
                price: self.codec.decode(index),
                quantity: level.total_qty,
                orders: level.count,
            })
        };
        match side {
            Side::Buy => (0..=self.best_bid).rev().filter_map(level_at).take(levels).collect(),
            Side::Sell => (self.best_ask..self.codec.levels())
                .filter_map(level_at)
                .take(levels)
                .collect(),
        }
    }
}

impl OrderBook for StaticOrderBook {
    fn bid(&self) -> Option<Quote> {
        self.best_level(Side::Buy).map(|l| self.codec.decode(l))
    }

    fn ask(&self) -> Option<Quote> {
        self.best_level(Side::Sell).map(|l| self.codec.decode(l))
    }

    fn insert(&mut self, order: &LimitOrder) -> Result<(), BookError> {
        let Some(limit) = self.validate(order) else {
            self.reports.push(Self::aggressor_report(
                order,
                ReportState::Invalid,
                order.quantity,
            ));
            return Ok(());
        };

        if order.lifetime == Lifetime::FillOrKill
            && !self.fillable(order.side, limit, order.quantity)
        {
            debug!(owner = order.owner, quantity = order.quantity, "fill-or-kill order killed");
            self.reports.push(Self::aggressor_report(
                order,
                ReportState::Cancel,
                order.quantity,
            ));
            return Ok(());
        }

        let remaining_qty = self.cross_order(order, limit);
        if remaining_qty == 0 {
            return Ok(());
        }

        match order.lifetime {
            Lifetime::GoodUntilCancelled => self.rest_order(order, limit, remaining_qty),
            Lifetime::ImmediateOrCancel | Lifetime::FillOrKill => {
                debug!(
                    owner = order.owner,
                    quantity = remaining_qty,
                    "cancelling unfilled remainder"
                );
                self.reports.push(Self::aggressor_report(
                    order,
                    ReportState::Cancel,
                    remaining_qty,
                ));
                Ok(())
            }
        }
    }

    fn cancel(&mut self, order_id: OrderId) -> Result<(), BookError> {
        let index = self
            .arena
            .resolve(order_id)
            .ok_or(BookError::UnknownOrder(order_id))?;
        let node = self.arena[index];

        // Unlink before the slot can be reused
        let emptied = self.levels[node.level as usize].remove(&mut self.arena, index);
        self.arena.remove(index);
        self.resting_qty -= u64::from(node.qty);

        if emptied {
            self.level_emptied(node.level, node.side);
        }

        debug!(id = order_id, quantity = node.qty, "order cancelled");
        self.reports.push(ExecutionReport {
            state: ReportState::Cancel,
            side: node.side,
            quantity: node.qty,
            identifier: order_id,
            limit: self.codec.decode(node.level),
            owner: node.owner,
        });
        Ok(())
    }

    fn reports(&self) -> &[ExecutionReport] {
        &self.reports
    }

    fn take_reports(&mut self) -> Vec<ExecutionReport> {
        std::mem::take(&mut self.reports)
    }

    fn clear_reports(&mut self) {
        self.reports.clear();
    }

    fn orders(&self) -> Vec<OrderId> {
        self.arena.indices().map(|i| self.arena.key(i)).collect()
    }

    fn order_count(&self) -> usize {
        self.arena.allocated() as usize
    }

    fn resting_quantity(&self) -> u64 {
        self.resting_qty
    }

    fn depth(&self, levels: usize) -> DepthSnapshot {
        DepthSnapshot {
            bids: self.collect_depth(Side::Buy, levels),
            asks: self.collect_depth(Side::Sell, levels),
        }
    }
}
