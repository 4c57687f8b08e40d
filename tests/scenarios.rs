//! Scenario Tests - End-to-end behaviour of both book variants.
//!
//! Walks through concrete order flows and checks the properties every
//! book must hold: round-trip pricing, range rejection, price-time
//! priority, conservation and best-price consistency.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sim_lob::{
    Currency, ExecutionReport, Lifetime, LimitOrder, OrderBook, Price, PriceCodec, Quote,
    ReportState, Side, StaticOrderBook, TreeOrderBook, AGGRESSOR_ID,
};

fn usd(amount: f64) -> Quote {
    Quote::new(Price::from_f64(amount, Currency::USD), 1)
}

fn order(side: Side, amount: f64, quantity: u32, lifetime: Lifetime) -> LimitOrder {
    LimitOrder::new("ACME", 1, side, usd(amount), quantity, lifetime)
}

fn gtc(side: Side, amount: f64, quantity: u32) -> LimitOrder {
    order(side, amount, quantity, Lifetime::GoodUntilCancelled)
}

/// [0.01, 10.00] USD at one cent
fn static_book() -> StaticOrderBook {
    StaticOrderBook::new(usd(0.01), usd(10.00), 1024).unwrap()
}

fn tree_book() -> TreeOrderBook {
    TreeOrderBook::new(Currency::USD, 1).unwrap()
}

/// Both variants, for running one scenario against each
fn books() -> Vec<(&'static str, Box<dyn OrderBook>)> {
    vec![
        ("static", Box::new(static_book())),
        ("tree", Box::new(tree_book())),
    ]
}

fn submit(book: &mut dyn OrderBook, order: &LimitOrder) -> Vec<ExecutionReport> {
    book.insert(order).unwrap();
    book.take_reports()
}

/// (quantity, price) of each aggressor fill
fn fills(reports: &[ExecutionReport]) -> Vec<(u32, Quote)> {
    reports
        .iter()
        .filter(|r| r.state == ReportState::Match && r.is_aggressor())
        .map(|r| (r.quantity, r.limit))
        .collect()
}

fn placed(reports: &[ExecutionReport]) -> Option<&ExecutionReport> {
    reports.iter().find(|r| r.state == ReportState::Placement)
}

// ============================================================================
// Concrete Scenarios
// ============================================================================

#[test]
fn test_sweep_bids() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        submit(book, &gtc(Side::Buy, 4.75, 500));
        submit(book, &gtc(Side::Buy, 4.76, 500));
        submit(book, &gtc(Side::Buy, 4.74, 1000));

        // Best price first, then the next level
        let reports = submit(book, &gtc(Side::Sell, 4.69, 750));
        assert_eq!(fills(&reports), vec![(500, usd(4.76)), (250, usd(4.75))], "{}", name);
        assert_eq!(reports.len(), 4, "{}", name);
        assert_eq!(book.bid(), Some(usd(4.75)), "{}", name);

        // 250 left at 4.75; the rest of the sell becomes the new ask
        let reports = submit(book, &gtc(Side::Sell, 4.75, 1000));
        assert_eq!(fills(&reports), vec![(250, usd(4.75))], "{}", name);
        assert_eq!(placed(&reports).unwrap().quantity, 750, "{}", name);
        assert_eq!(book.ask(), Some(usd(4.75)), "{}", name);
        assert_eq!(book.bid(), Some(usd(4.74)), "{}", name);
    }
}

#[test]
fn test_sweep_bids_with_second_order_at_level() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        submit(book, &gtc(Side::Buy, 4.75, 500));
        submit(book, &gtc(Side::Buy, 4.75, 500));
        submit(book, &gtc(Side::Buy, 4.76, 500));
        submit(book, &gtc(Side::Buy, 4.74, 1000));

        let reports = submit(book, &gtc(Side::Sell, 4.69, 750));
        assert_eq!(fills(&reports), vec![(500, usd(4.76)), (250, usd(4.75))], "{}", name);
        assert_eq!(book.bid(), Some(usd(4.75)), "{}", name);

        // 750 rests at 4.75 across two orders; fills 250 + 500
        let reports = submit(book, &gtc(Side::Sell, 4.75, 1000));
        let total: u32 = fills(&reports).iter().map(|(q, _)| q).sum();
        assert_eq!(total, 750, "{}", name);
        assert_eq!(placed(&reports).unwrap().quantity, 250, "{}", name);
        assert_eq!(book.ask(), Some(usd(4.75)), "{}", name);
        assert_eq!(book.bid(), Some(usd(4.74)), "{}", name);
    }
}

#[test]
fn test_match_reports_pair_up() {
    let mut book = static_book();
    let resting = submit(&mut book, &LimitOrder {
        owner: 5,
        ..gtc(Side::Buy, 4.75, 500)
    });
    let resting_id = placed(&resting).unwrap().identifier;

    // Incoming sell at a lower limit trades at the resting price
    let reports = submit(&mut book, &LimitOrder {
        owner: 9,
        ..gtc(Side::Sell, 4.50, 200)
    });
    assert_eq!(reports.len(), 2);

    let aggressor = &reports[0];
    assert_eq!(aggressor.state, ReportState::Match);
    assert_eq!(aggressor.identifier, AGGRESSOR_ID);
    assert_eq!(aggressor.side, Side::Sell);
    assert_eq!(aggressor.owner, 9);
    assert_eq!(aggressor.limit, usd(4.75));

    let maker = &reports[1];
    assert_eq!(maker.state, ReportState::Match);
    assert_eq!(maker.identifier, resting_id);
    assert_eq!(maker.side, Side::Buy);
    assert_eq!(maker.owner, 5);
    assert_eq!(maker.quantity, 200);
    assert_eq!(maker.limit, usd(4.75));
}

#[test]
fn test_ioc_without_liquidity() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        let reports = submit(book, &order(Side::Buy, 5.00, 100, Lifetime::ImmediateOrCancel));

        assert_eq!(reports.len(), 1, "{}", name);
        assert_eq!(reports[0].state, ReportState::Cancel, "{}", name);
        assert_eq!(reports[0].quantity, 100, "{}", name);
        assert_eq!(book.order_count(), 0, "{}", name);
        assert_eq!(book.bid(), None, "{}", name);
    }
}

#[test]
fn test_fok_is_all_or_nothing() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        submit(book, &gtc(Side::Sell, 5.00, 300));
        submit(book, &gtc(Side::Sell, 5.01, 300));

        // 600 available through 5.01, only 300 through 5.00
        let reports = submit(book, &order(Side::Buy, 5.00, 400, Lifetime::FillOrKill));
        assert_eq!(reports.len(), 1, "{}", name);
        assert_eq!(reports[0].state, ReportState::Cancel, "{}", name);
        assert_eq!(reports[0].quantity, 400, "{}", name);
        assert_eq!(book.resting_quantity(), 600, "{}", name);

        let reports = submit(book, &order(Side::Buy, 5.01, 400, Lifetime::FillOrKill));
        assert_eq!(fills(&reports), vec![(300, usd(5.00)), (100, usd(5.01))], "{}", name);
        assert_eq!(book.ask(), Some(usd(5.01)), "{}", name);
        assert_eq!(book.resting_quantity(), 200, "{}", name);
    }
}

#[test]
fn test_ioc_partial_fill() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        submit(book, &gtc(Side::Buy, 3.00, 100));

        let reports = submit(book, &order(Side::Sell, 2.90, 250, Lifetime::ImmediateOrCancel));
        assert_eq!(fills(&reports), vec![(100, usd(3.00))], "{}", name);
        let cancel = reports.last().unwrap();
        assert_eq!(cancel.state, ReportState::Cancel, "{}", name);
        assert_eq!(cancel.quantity, 150, "{}", name);
        assert_eq!(book.order_count(), 0, "{}", name);
    }
}

// ============================================================================
// Property: Round-trip Codec
// ============================================================================

#[test]
fn test_codec_round_trip_at_tick() {
    let lower = Quote::new(Price::new(1_000, Currency::JPY), 100);
    let upper = Quote::new(Price::new(5_000, Currency::JPY), 100);
    let codec = PriceCodec::new(lower, upper, 25).unwrap();
    assert_eq!(codec.levels(), 161);

    for value in (1_000..=5_000).step_by(25) {
        let quote = lower.with_value(value);
        let level = codec.encode(&quote).unwrap();
        assert_eq!(codec.decode(level), quote);
    }
    assert_eq!(codec.encode(&lower.with_value(1_010)), None);
}

// ============================================================================
// Property: Range Rejection
// ============================================================================

#[test]
fn test_rejections_leave_book_untouched() {
    let mut book = static_book();
    submit(&mut book, &gtc(Side::Buy, 4.00, 100));
    submit(&mut book, &gtc(Side::Sell, 6.00, 100));
    let before = book.depth(usize::MAX);

    let rejected = [
        gtc(Side::Buy, 0.00, 10),
        gtc(Side::Sell, 10.01, 10),
        gtc(Side::Buy, 5.00, 0),
        LimitOrder {
            limit: Quote::new(Price::new(500, Currency::EUR), 1),
            ..gtc(Side::Buy, 5.00, 10)
        },
        LimitOrder {
            limit: Quote::new(Price::new(500, Currency::USD), 10),
            ..gtc(Side::Buy, 5.00, 10)
        },
    ];

    for order in &rejected {
        let reports = submit(&mut book, order);
        assert_eq!(reports.len(), 1, "{:?}", order);
        assert_eq!(reports[0].state, ReportState::Invalid, "{:?}", order);
        assert_eq!(reports[0].quantity, order.quantity);
    }

    assert_eq!(book.depth(usize::MAX), before);
    assert_eq!(book.order_count(), 2);
}

#[test]
fn test_off_tick_rejection() {
    let mut book =
        StaticOrderBook::with_tick(usd(1.00), usd(2.00), 5, 64).unwrap();

    let reports = submit(&mut book, &gtc(Side::Buy, 1.03, 10));
    assert_eq!(reports[0].state, ReportState::Invalid);

    let reports = submit(&mut book, &gtc(Side::Buy, 1.05, 10));
    assert_eq!(reports[0].state, ReportState::Placement);
    assert_eq!(book.bid(), Some(usd(1.05)));
}

// ============================================================================
// Property: Price-Time Priority
// ============================================================================

#[test]
fn test_time_priority_at_same_price() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        let first = submit(book, &LimitOrder { owner: 1, ..gtc(Side::Sell, 7.00, 10) });
        submit(book, &LimitOrder { owner: 2, ..gtc(Side::Sell, 7.00, 10) });

        let reports = submit(book, &gtc(Side::Buy, 7.00, 10));
        let maker = reports.iter().find(|r| !r.is_aggressor()).unwrap();
        assert_eq!(maker.owner, 1, "{}", name);
        assert_eq!(maker.identifier, placed(&first).unwrap().identifier, "{}", name);
    }
}

#[test]
fn test_price_priority_over_arrival() {
    for (name, mut book) in books() {
        let book = book.as_mut();
        submit(book, &LimitOrder { owner: 1, ..gtc(Side::Sell, 7.10, 10) });
        submit(book, &LimitOrder { owner: 2, ..gtc(Side::Sell, 7.00, 10) });

        let reports = submit(book, &gtc(Side::Buy, 7.10, 10));
        let maker = reports.iter().find(|r| !r.is_aggressor()).unwrap();
        assert_eq!(maker.owner, 2, "{}", name);
        assert_eq!(maker.limit, usd(7.00), "{}", name);
    }
}

// ============================================================================
// Property: Conservation & Best-Price Consistency
// ============================================================================

#[test]
fn test_conservation_and_best_prices() {
    const SEED: u64 = 0x5EED;
    const OPS: usize = 5_000;

    for (name, mut book) in books() {
        let book = book.as_mut();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let mut live = Vec::new();

        // placed - matched - cancelled, over resting orders only
        let mut balance: i64 = 0;

        for _ in 0..OPS {
            if live.is_empty() || rng.gen_bool(0.7) {
                let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                let cents = rng.gen_range(400..600);
                let order = LimitOrder::new(
                    "ACME",
                    1,
                    side,
                    Quote::new(Price::new(cents, Currency::USD), 1),
                    rng.gen_range(1..100),
                    Lifetime::GoodUntilCancelled,
                );
                let reports = submit(book, &order);
                for report in &reports {
                    match report.state {
                        ReportState::Placement => {
                            balance += i64::from(report.quantity);
                            live.push(report.identifier);
                        }
                        ReportState::Match if !report.is_aggressor() => {
                            balance -= i64::from(report.quantity)
                        }
                        _ => {}
                    }
                }
            } else {
                let id = live.swap_remove(rng.gen_range(0..live.len()));
                if book.cancel(id).is_ok() {
                    let reports = book.take_reports();
                    balance -= i64::from(reports[0].quantity);
                }
            }

            assert_eq!(balance, book.resting_quantity() as i64, "{}", name);

            let depth = book.depth(usize::MAX);
            if let Some(best) = depth.bids.first() {
                assert_eq!(book.bid(), Some(best.price), "{}", name);
                assert!(depth.bids.iter().all(|l| l.price <= best.price), "{}", name);
            }
            if let Some(best) = depth.asks.first() {
                assert_eq!(book.ask(), Some(best.price), "{}", name);
                assert!(depth.asks.iter().all(|l| l.price >= best.price), "{}", name);
            }
        }
    }
}

// ============================================================================
// Introspection
// ============================================================================

#[test]
fn test_orders_and_depth_ladder() {
    let mut book = static_book();
    let a = placed(&submit(&mut book, &gtc(Side::Buy, 4.75, 500))).unwrap().identifier;
    let b = placed(&submit(&mut book, &gtc(Side::Sell, 4.80, 200))).unwrap().identifier;

    let mut orders = book.orders();
    orders.sort_unstable();
    let mut expected = vec![a, b];
    expected.sort_unstable();
    assert_eq!(orders, expected);

    let ladder = book.depth(10).to_string();
    let lines: Vec<&str> = ladder.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("4.80") && lines[1].trim_end().ends_with("200"));
    assert!(lines[2].contains("4.75") && lines[2].trim_start().starts_with("500"));
}
