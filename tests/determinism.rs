//! Determinism Test - Golden Master verification.
//!
//! Verifies that the engine produces identical results across runs
//! when given the same input sequence.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sim_lob::{
    BookConfig, CancelOrder, Command, Currency, Engine, ExecutionReport, Lifetime, LimitOrder,
    OrderId, Price, Quote, ReportState, Side,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const TICKERS: [&str; 2] = ["STATIC", "TREE"];

/// A scripted action. Cancels pick among the orders resting at run time.
#[derive(Clone, Debug)]
enum Step {
    Place(LimitOrder),
    Cancel { ticker: &'static str, pick: usize },
}

fn usd(cents: i64) -> Quote {
    Quote::new(Price::new(cents, Currency::USD), 1)
}

/// Generate a deterministic sequence of steps
fn generate_steps(seed: u64, count: usize) -> Vec<Step> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let ticker = TICKERS[rng.gen_range(0..TICKERS.len())];
            // 70% place, 30% cancel
            if rng.gen_bool(0.7) {
                let lifetime = match rng.gen_range(0..10) {
                    0 => Lifetime::ImmediateOrCancel,
                    1 => Lifetime::FillOrKill,
                    _ => Lifetime::GoodUntilCancelled,
                };
                Step::Place(LimitOrder::new(
                    ticker,
                    rng.gen_range(1..100),
                    if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
                    usd(rng.gen_range(95_000..105_000)), // 950.00 to 1050.00
                    rng.gen_range(1..500),
                    lifetime,
                ))
            } else {
                Step::Cancel {
                    ticker,
                    pick: rng.gen(),
                }
            }
        })
        .collect()
}

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine
        .list_with_config(
            TICKERS[0],
            &BookConfig::Static {
                minimum: usd(90_000),
                maximum: usd(110_000),
                tick: 1,
                capacity: 100_000,
            },
        )
        .unwrap();
    engine
        .list_with_config(
            TICKERS[1],
            &BookConfig::Tree {
                valuation: Currency::USD,
                lot: 1,
            },
        )
        .unwrap();
    engine
}

/// Run the engine over a script and return (report hash, state hash)
fn run_engine(steps: &[Step]) -> (u64, u64) {
    let mut engine = engine();
    let mut live: [Vec<OrderId>; 2] = Default::default();
    let mut hasher = DefaultHasher::new();

    for step in steps {
        let (slot, command) = match step {
            Step::Place(order) => (
                ticker_slot(&order.ticker),
                Command::Place(order.clone()),
            ),
            Step::Cancel { ticker, pick } => {
                let slot = ticker_slot(ticker);
                if live[slot].is_empty() {
                    continue;
                }
                let order_id = live[slot].swap_remove(pick % live[slot].len());
                (
                    slot,
                    Command::Cancel(CancelOrder {
                        ticker: ticker.to_string(),
                        order_id,
                    }),
                )
            }
        };

        let reports = engine.process_command(&command);
        track_placements(&mut live[slot], &reports);
        reports.hash(&mut hasher);
    }

    (hasher.finish(), engine.state_hash())
}

fn ticker_slot(ticker: &str) -> usize {
    TICKERS.iter().position(|t| *t == ticker).unwrap()
}

fn track_placements(live: &mut Vec<OrderId>, reports: &[ExecutionReport]) {
    live.extend(
        reports
            .iter()
            .filter(|r| r.state == ReportState::Placement)
            .map(|r| r.identifier),
    );
}

#[test]
fn test_determinism_small() {
    const SEED: u64 = 0xDEADBEEF;
    const COUNT: usize = 1000;
    const RUNS: usize = 10;

    let steps = generate_steps(SEED, COUNT);

    // Run multiple times and verify identical results
    let (first_report_hash, first_state_hash) = run_engine(&steps);

    for run in 1..RUNS {
        let (report_hash, state_hash) = run_engine(&steps);

        assert_eq!(
            report_hash, first_report_hash,
            "Report hash mismatch on run {}",
            run
        );
        assert_eq!(
            state_hash, first_state_hash,
            "State hash mismatch on run {}",
            run
        );
    }

    println!("Determinism test passed!");
    println!("  Steps: {}", COUNT);
    println!("  Runs: {}", RUNS);
    println!("  Report hash: {:#018x}", first_report_hash);
    println!("  State hash: {:#018x}", first_state_hash);
}

#[test]
fn test_determinism_large() {
    const SEED: u64 = 0xCAFEBABE;
    const COUNT: usize = 100_000;
    const RUNS: usize = 3;

    let steps = generate_steps(SEED, COUNT);

    let (first_report_hash, first_state_hash) = run_engine(&steps);

    for run in 1..RUNS {
        let (report_hash, state_hash) = run_engine(&steps);

        assert_eq!(report_hash, first_report_hash, "Report hash mismatch on run {}", run);
        assert_eq!(state_hash, first_state_hash, "State hash mismatch on run {}", run);
    }

    println!("Large determinism test passed!");
    println!("  Steps: {}", COUNT);
    println!("  Report hash: {:#018x}", first_report_hash);
    println!("  State hash: {:#018x}", first_state_hash);
}

#[test]
fn test_different_seeds_produce_different_results() {
    let steps1 = generate_steps(1, 1000);
    let steps2 = generate_steps(2, 1000);

    let (hash1, _) = run_engine(&steps1);
    let (hash2, _) = run_engine(&steps2);

    assert_ne!(hash1, hash2, "Different seeds should produce different results");
}
