//! Tree Order Book - ordered maps keyed by price.
//!
//! Accepts any price in the book's valuation and lot, at O(log n) per level
//! lookup. Each price holds its orders keyed by identifier; identifiers come
//! from a counter, so key order is arrival order and cancel stays O(log n).

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::command::{
    ExecutionReport, Lifetime, LimitOrder, OrderId, OwnerId, ReportState, Side, AGGRESSOR_ID,
};
use crate::error::BookError;
use crate::order_book::{DepthLevel, DepthSnapshot, OrderBook};
use crate::price::{Currency, Price, Quote};

#[derive(Clone, Copy, Debug)]
struct Resting {
    owner: OwnerId,
    quantity: u32,
}

/// Orders at one price in time priority
type Queue = BTreeMap<OrderId, Resting>;

pub struct TreeOrderBook {
    valuation: Currency,
    lot: u64,
    /// Buy queues by minor-unit price; best is the last key
    bids: BTreeMap<i64, Queue>,
    /// Sell queues by minor-unit price; best is the first key
    asks: BTreeMap<i64, Queue>,
    /// OrderId -> (side, price) for cancel lookup
    index: FxHashMap<OrderId, (Side, i64)>,
    next_id: OrderId,
    reports: Vec<ExecutionReport>,
    resting_qty: u64,
}

impl TreeOrderBook {
    /// # Errors
    /// [`BookError::ZeroLot`] if `lot` is zero.
    pub fn new(valuation: Currency, lot: u64) -> Result<Self, BookError> {
        if lot == 0 {
            return Err(BookError::ZeroLot);
        }
        Ok(Self {
            valuation,
            lot,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: FxHashMap::default(),
            next_id: 0,
            reports: Vec::new(),
            resting_qty: 0,
        })
    }

    #[inline]
    fn quote(&self, value: i64) -> Quote {
        Quote {
            price: Price::new(value, self.valuation),
            lot: self.lot,
        }
    }

    fn is_valid(&self, order: &LimitOrder) -> bool {
        if order.quantity == 0 {
            warn!(owner = order.owner, "rejecting order with zero quantity");
            return false;
        }
        if order.limit.lot != self.lot || order.limit.price.valuation != self.valuation {
            warn!(
                owner = order.owner,
                limit = %order.limit,
                expected = %self.quote(0),
                "rejecting order quoted in another valuation or lot"
            );
            return false;
        }
        true
    }

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

    /// Opposing quantity an order could reach within its limit.
    fn available(&self, order: &LimitOrder) -> u64 {
        let limit = order.limit.value();
        let sum = |queue: &Queue| queue.values().map(|r| u64::from(r.quantity)).sum::<u64>();
        match order.side {
            Side::Buy => self.asks.range(..=limit).map(|(_, q)| sum(q)).sum(),
            Side::Sell => self.bids.range(limit..).map(|(_, q)| sum(q)).sum(),
        }
    }

    /// Cross an incoming order against the opposite side, best price first.
    ///
    /// # Returns
    /// Remaining quantity after matching
    fn cross_order(&mut self, order: &LimitOrder) -> u32 {
        let mut remaining_qty = order.quantity;
        let (levels, index, reports) = match order.side {
            Side::Buy => (&mut self.asks, &mut self.index, &mut self.reports),
            Side::Sell => (&mut self.bids, &mut self.index, &mut self.reports),
        };

        while remaining_qty > 0 {
            let best = match order.side {
                Side::Buy => levels.first_entry(),
                Side::Sell => levels.last_entry(),
            };
            let Some(mut entry) = best else {
                break;
            };
            let price = order.limit.with_value(*entry.key());
            if !order.crosses(&price) {
                break;
            }

            let queue = entry.get_mut();
            while remaining_qty > 0 {
                let Some(mut front) = queue.first_entry() else {
                    break;
                };
                let maker_id = *front.key();
                let maker = front.get_mut();
                let trade_qty = remaining_qty.min(maker.quantity);
                trace!(price = %price, quantity = trade_qty, maker = maker_id, "match");

                reports.push(ExecutionReport {
                    limit: price,
                    ..Self::aggressor_report(order, ReportState::Match, trade_qty)
                });
                reports.push(ExecutionReport {
                    state: ReportState::Match,
                    side: order.side.opposite(),
                    quantity: trade_qty,
                    identifier: maker_id,
                    limit: price,
                    owner: maker.owner,
                });

                remaining_qty -= trade_qty;
                maker.quantity -= trade_qty;
                if maker.quantity == 0 {
                    index.remove(&maker_id);
                    front.remove();
                }
            }

            if queue.is_empty() {
                entry.remove();
            }
        }

        self.resting_qty -= u64::from(order.quantity - remaining_qty);
        remaining_qty
    }

    fn rest_order(&mut self, order: &LimitOrder, quantity: u32) {
        let id = self.next_id;
        self.next_id += 1;

        let price = order.limit.value();
        let levels = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        levels.entry(price).or_default().insert(
            id,
            Resting {
                owner: order.owner,
                quantity,
            },
        );
        self.index.insert(id, (order.side, price));
        self.resting_qty += u64::from(quantity);

        debug!(id, side = %order.side, quantity, limit = %order.limit, "order placed");
        self.reports.push(ExecutionReport {
            identifier: id,
            ..Self::aggressor_report(order, ReportState::Placement, quantity)
        });
    }

    fn depth_side<'a>(
        &self,
        levels: impl Iterator<Item = (&'a i64, &'a Queue)>,
        count: usize,
    ) -> Vec<DepthLevel> {
        levels
            .take(count)
            .map(|(&price, queue)| DepthLevel {
                price: self.quote(price),
                quantity: queue.values().map(|r| u64::from(r.quantity)).sum(),
                orders: queue.len() as u32,
            })
            .collect()
    }
}

impl OrderBook for TreeOrderBook {
    fn bid(&self) -> Option<Quote> {
        self.bids.last_key_value().map(|(&p, _)| self.quote(p))
    }

    fn ask(&self) -> Option<Quote> {
        self.asks.first_key_value().map(|(&p, _)| self.quote(p))
    }

    fn insert(&mut self, order: &LimitOrder) -> Result<(), BookError> {
        if !self.is_valid(order) {
            self.reports.push(Self::aggressor_report(
                order,
                ReportState::Invalid,
                order.quantity,
            ));
            return Ok(());
        }

        if order.lifetime == Lifetime::FillOrKill && self.available(order) < u64::from(order.quantity)
        {
            debug!(owner = order.owner, quantity = order.quantity, "fill-or-kill order killed");
            self.reports.push(Self::aggressor_report(
                order,
                ReportState::Cancel,
                order.quantity,
            ));
            return Ok(());
        }

        let remaining_qty = self.cross_order(order);
        if remaining_qty == 0 {
            return Ok(());
        }

        match order.lifetime {
            Lifetime::GoodUntilCancelled => self.rest_order(order, remaining_qty),
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
            }
        }
        Ok(())
    }

    fn cancel(&mut self, order_id: OrderId) -> Result<(), BookError> {
        let (side, price) = self
            .index
            .remove(&order_id)
            .ok_or(BookError::UnknownOrder(order_id))?;
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };

        let Some(queue) = levels.get_mut(&price) else {
            return Err(BookError::UnknownOrder(order_id));
        };
        let Some(resting) = queue.remove(&order_id) else {
            return Err(BookError::UnknownOrder(order_id));
        };
        if queue.is_empty() {
            levels.remove(&price);
        }
        self.resting_qty -= u64::from(resting.quantity);

        debug!(id = order_id, quantity = resting.quantity, "order cancelled");
        self.reports.push(ExecutionReport {
            state: ReportState::Cancel,
            side,
            quantity: resting.quantity,
            identifier: order_id,
            limit: self.quote(price),
            owner: resting.owner,
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
        let mut ids: Vec<_> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn order_count(&self) -> usize {
        self.index.len()
    }

    fn resting_quantity(&self) -> u64 {
        self.resting_qty
    }

    fn depth(&self, levels: usize) -> DepthSnapshot {
        DepthSnapshot {
            bids: self.depth_side(self.bids.iter().rev(), levels),
            asks: self.depth_side(self.asks.iter(), levels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(value: i64) -> Quote {
        Quote::new(Price::new(value, Currency::USD), 1)
    }

    fn order(side: Side, value: i64, quantity: u32) -> LimitOrder {
        LimitOrder::new("TEST", 1, side, usd(value), quantity, Lifetime::GoodUntilCancelled)
    }

    fn book() -> TreeOrderBook {
        TreeOrderBook::new(Currency::USD, 1).unwrap()
    }

    #[test]
    fn test_zero_lot_rejected() {
        assert!(matches!(
            TreeOrderBook::new(Currency::USD, 0),
            Err(BookError::ZeroLot)
        ));
    }

    #[test]
    fn test_sequential_identifiers() {
        let mut book = book();
        book.insert(&order(Side::Buy, 100, 10)).unwrap();
        book.insert(&order(Side::Sell, 200, 10)).unwrap();
        book.insert(&order(Side::Buy, 90, 10)).unwrap();

        let ids: Vec<_> = book.reports().iter().map(|r| r.identifier).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(book.orders(), vec![0, 1, 2]);
        assert_eq!(book.bid(), Some(usd(100)));
        assert_eq!(book.ask(), Some(usd(200)));
    }

    #[test]
    fn test_unbounded_prices() {
        let mut book = book();
        book.insert(&order(Side::Sell, 1_000_000_000, 1)).unwrap();
        book.insert(&order(Side::Buy, -5, 1)).unwrap();
        assert_eq!(book.ask(), Some(usd(1_000_000_000)));
        assert_eq!(book.bid(), Some(usd(-5)));
    }

    #[test]
    fn test_rejections() {
        let mut book = book();
        book.insert(&order(Side::Buy, 100, 0)).unwrap();
        let mut other_lot = order(Side::Buy, 100, 10);
        other_lot.limit = Quote::new(Price::new(100, Currency::USD), 10);
        book.insert(&other_lot).unwrap();

        assert!(book.reports().iter().all(|r| r.state == ReportState::Invalid));
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_match_walks_levels_in_priority() {
        let mut book = book();
        book.insert(&LimitOrder { owner: 1, ..order(Side::Buy, 475, 500) }).unwrap();
        book.insert(&LimitOrder { owner: 2, ..order(Side::Buy, 476, 500) }).unwrap();
        book.insert(&LimitOrder { owner: 3, ..order(Side::Buy, 475, 500) }).unwrap();
        book.clear_reports();

        book.insert(&order(Side::Sell, 469, 750)).unwrap();
        let makers: Vec<_> = book
            .reports()
            .iter()
            .filter(|r| r.state == ReportState::Match && !r.is_aggressor())
            .map(|r| (r.owner, r.quantity, r.limit))
            .collect();
        assert_eq!(makers, vec![(2, 500, usd(476)), (1, 250, usd(475))]);
        assert_eq!(book.bid(), Some(usd(475)));
        assert_eq!(book.resting_quantity(), 750);
    }

    #[test]
    fn test_cancel() {
        let mut book = book();
        book.insert(&order(Side::Sell, 500, 10)).unwrap();
        book.insert(&order(Side::Sell, 500, 20)).unwrap();
        book.clear_reports();

        book.cancel(0).unwrap();
        assert_eq!(book.reports()[0].state, ReportState::Cancel);
        assert_eq!(book.reports()[0].quantity, 10);
        assert_eq!(book.ask(), Some(usd(500)));

        book.cancel(1).unwrap();
        assert_eq!(book.ask(), None);
        assert_eq!(book.cancel(1), Err(BookError::UnknownOrder(1)));
        assert_eq!(book.resting_quantity(), 0);
    }

    #[test]
    fn test_cancel_inside_level_keeps_time_priority() {
        let mut book = book();
        for owner in 1..=5 {
            book.insert(&LimitOrder { owner, ..order(Side::Buy, 475, 10) }).unwrap();
        }
        book.cancel(2).unwrap();
        book.cancel(0).unwrap();
        assert_eq!(book.orders(), vec![1, 3, 4]);
        assert_eq!(book.depth(1).bids[0].orders, 3);
        book.clear_reports();

        book.insert(&order(Side::Sell, 475, 25)).unwrap();
        let makers: Vec<_> = book
            .reports()
            .iter()
            .filter(|r| r.state == ReportState::Match && !r.is_aggressor())
            .map(|r| (r.identifier, r.quantity))
            .collect();
        assert_eq!(makers, vec![(1, 10), (3, 10), (4, 5)]);
        assert_eq!(book.orders(), vec![4]);
        assert_eq!(book.resting_quantity(), 5);
    }

    #[test]
    fn test_lifetimes() {
        let mut book = book();
        book.insert(&order(Side::Sell, 500, 10)).unwrap();
        book.clear_reports();

        let fok = LimitOrder {
            lifetime: Lifetime::FillOrKill,
            ..order(Side::Buy, 500, 11)
        };
        book.insert(&fok).unwrap();
        assert_eq!(book.reports().len(), 1);
        assert_eq!(book.reports()[0].state, ReportState::Cancel);
        assert_eq!(book.resting_quantity(), 10);
        book.clear_reports();

        let ioc = LimitOrder {
            lifetime: Lifetime::ImmediateOrCancel,
            ..fok
        };
        book.insert(&ioc).unwrap();
        let states: Vec<_> = book.reports().iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![ReportState::Match, ReportState::Match, ReportState::Cancel]
        );
        assert_eq!(book.reports()[2].quantity, 1);
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_depth() {
        let mut book = book();
        book.insert(&order(Side::Buy, 474, 1000)).unwrap();
        book.insert(&order(Side::Buy, 475, 300)).unwrap();
        book.insert(&order(Side::Buy, 475, 200)).unwrap();
        book.insert(&order(Side::Sell, 480, 70)).unwrap();

        let depth = book.depth(5);
        assert_eq!(depth.bids[0].price, usd(475));
        assert_eq!(depth.bids[0].quantity, 500);
        assert_eq!(depth.bids[0].orders, 2);
        assert_eq!(depth.bids[1].price, usd(474));
        assert_eq!(depth.asks.len(), 1);
        assert_eq!(book.spread(), Some(5));
    }
}
