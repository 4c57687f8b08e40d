use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use sim_lob::{
    Currency, DepthLevel, DepthSnapshot, Lifetime, LimitOrder, OrderBook, OrderId, Price, Quote,
    ReportState, Side, StaticOrderBook,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::{io, time::Duration};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Levels shown per side
const DEPTH: usize = 15;
const CAPACITY: u64 = 1_000_000;
/// Resting orders kept alive before the oldest are cancelled
const MAX_LIVE: usize = 50_000;
/// Book range in cents: 10.00 .. 6000.00
const LOWER: i64 = 1_000;
const UPPER: i64 = 600_000;

struct SharedStats {
    ops_count: AtomicU64,
    avg_latency_ns: AtomicU64,
    fills: AtomicU64,
    arena_used: AtomicU64,
    arena_capacity: AtomicU64,
    book_snapshot: RwLock<DepthSnapshot>,
}

impl SharedStats {
    fn new(capacity: u64) -> Self {
        Self {
            ops_count: AtomicU64::new(0),
            avg_latency_ns: AtomicU64::new(0),
            fills: AtomicU64::new(0),
            arena_used: AtomicU64::new(0),
            arena_capacity: AtomicU64::new(capacity),
            book_snapshot: RwLock::new(DepthSnapshot::default()),
        }
    }
}

fn usd(cents: i64) -> Quote {
    Quote::new(Price::new(cents, Currency::USD), 1)
}

// Helper to generate the ASCII bar string
fn render_level_bars(levels: &[DepthLevel]) -> String {
    let mut out = String::new();
    let max_qty = levels.iter().map(|l| l.quantity).max().unwrap_or(1) as f32;

    for level in levels {
        // Bar length, 20 chars max
        let bar_len = ((level.quantity as f32 / max_qty) * 20.0) as usize;
        let bar = "█".repeat(bar_len);
        out.push_str(&format!(
            "{:>8.2} {} {:<5} ({})\n",
            level.price.as_f64(),
            bar,
            level.quantity,
            level.orders
        ));
    }
    out
}

/// Synthetic flow: a random walk mid with orders placed around it.
fn run_flow(stats: &SharedStats) {
    let mut book = match StaticOrderBook::new(usd(LOWER), usd(UPPER), CAPACITY) {
        Ok(book) => book,
        Err(error) => {
            error!(%error, "could not build demo book");
            return;
        }
    };

    let mut live: VecDeque<OrderId> = VecDeque::new();
    let mut rng = 12345u64; // Simple LCG for speed
    let mut loop_count = 0u64;

    // Start at 3,000.00
    let mut current_mid_price = 300_000i64;

    loop {
        // Batch processing to reduce atomic contention overhead
        const BATCH_SIZE: u64 = 1000;
        let start_batch = std::time::Instant::now();
        let mut fills = 0u64;

        for _ in 0..BATCH_SIZE {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);

            // High 32 bits; LCG low bits are poor
            let r = rng >> 32;

            // 1% chance to drift per order: -5 to +5 cents
            if r % 100 == 0 {
                let drift = (r % 11) as i64 - 5;
                current_mid_price = (current_mid_price + drift).clamp(LOWER + 1_000, UPPER - 1_000);
            }

            let side = if r % 2 == 0 { Side::Buy } else { Side::Sell };

            // Spread of 1.00 to 5.00 around the mid, plus noise
            let spread_offset = (100 + (r % 400) as i64) / 2;
            let noise = (r % 20) as i64 - 10;
            let price = match side {
                Side::Buy => current_mid_price - spread_offset + noise,
                Side::Sell => current_mid_price + spread_offset + noise,
            };

            // One order in ten is a marketable IOC through the mid
            let (price, lifetime) = if r % 10 == 3 {
                let through = match side {
                    Side::Buy => price + 2 * spread_offset,
                    Side::Sell => price - 2 * spread_offset,
                };
                (through, Lifetime::ImmediateOrCancel)
            } else {
                (price, Lifetime::GoodUntilCancelled)
            };

            let order = LimitOrder::new(
                "ETH-USD",
                r % 64,
                side,
                usd(price.clamp(LOWER, UPPER)),
                1 + (rng % 100) as u32,
                lifetime,
            );
            let _ = book.insert(&order);

            for report in book.take_reports() {
                match report.state {
                    ReportState::Placement => live.push_back(report.identifier),
                    ReportState::Match if report.is_aggressor() => fills += 1,
                    _ => {}
                }
            }

            // Oldest interest leaves first; it may already have traded
            while live.len() > MAX_LIVE {
                if let Some(id) = live.pop_front() {
                    let _ = book.cancel(id);
                }
            }
            book.clear_reports();
        }

        loop_count += 1;

        stats.ops_count.fetch_add(BATCH_SIZE, Ordering::Relaxed);
        stats.fills.fetch_add(fills, Ordering::Relaxed);

        let elapsed = start_batch.elapsed();
        let ns_per_op = elapsed.as_nanos() as u64 / BATCH_SIZE;
        stats.avg_latency_ns.store(ns_per_op, Ordering::Relaxed);
        stats.arena_used.store(book.order_count() as u64, Ordering::Relaxed);

        // Publish a snapshot every 50 batches
        if loop_count % 50 == 0 {
            if let Ok(mut write_guard) = stats.book_snapshot.write() {
                *write_guard = book.depth(DEPTH);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; keep them quiet under the alternate screen
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "error".into()))
        .with_writer(io::stderr)
        .init();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let stats = Arc::new(SharedStats::new(CAPACITY));
    let flow_stats = Arc::clone(&stats);

    // Book thread (synthetic load); a single writer owns the book
    thread::spawn(move || run_flow(&flow_stats));

    // Run TUI Loop
    let mut last_ops = 0;
    let mut last_time = std::time::Instant::now();
    let mut throughput = 0.0;

    loop {
        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    break;
                }
            }
        }

        // Calculate throughput
        let now = std::time::Instant::now();
        if now.duration_since(last_time).as_secs_f64() >= 1.0 {
            let current_ops = stats.ops_count.load(Ordering::Relaxed);
            throughput = (current_ops - last_ops) as f64;
            last_ops = current_ops;
            last_time = now;
        }

        let snapshot = stats
            .book_snapshot
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints(
                    [
                        Constraint::Length(3),  // Header
                        Constraint::Min(10),    // Book
                        Constraint::Length(10), // Stats
                    ]
                    .as_ref(),
                )
                .split(f.size());

            // 1. Header
            let header = Block::default()
                .borders(Borders::ALL)
                .title("SIM-LOB Ladder Demo (random walk)");
            let title = Paragraph::new("ETH-USD | Press 'q' to quit")
                .block(header)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(title, chunks[0]);

            // 2. Book
            let book_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);

            let bids_widget = Paragraph::new(render_level_bars(&snapshot.bids)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("BIDS")
                    .style(Style::default().fg(Color::Green)),
            );
            let asks_widget = Paragraph::new(render_level_bars(&snapshot.asks)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("ASKS")
                    .style(Style::default().fg(Color::Red)),
            );

            f.render_widget(bids_widget, book_chunks[0]);
            f.render_widget(asks_widget, book_chunks[1]);

            // 3. Stats
            let ops_fmt = if throughput > 1_000_000.0 {
                format!("{:.2} M", throughput / 1_000_000.0)
            } else {
                format!("{:.0} k", throughput / 1_000.0)
            };

            let arena_used = stats.arena_used.load(Ordering::Relaxed);
            let arena_cap = stats.arena_capacity.load(Ordering::Relaxed);
            let arena_pct = (arena_used as f64 / arena_cap as f64) * 100.0;
            let latency = stats.avg_latency_ns.load(Ordering::Relaxed);
            let fills = stats.fills.load(Ordering::Relaxed);

            let stats_text = format!(
                "Throughput: {} ops/sec\nLatency (Avg Batch): {} ns\nFills: {}\nArena Usage: {} / {} ({:.1}%)",
                ops_fmt, latency, fills, arena_used, arena_cap, arena_pct
            );

            let stats_block = Paragraph::new(stats_text)
                .block(Block::default().borders(Borders::ALL).title("Book Telemetry"))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(stats_block, chunks[2]);
        })?;
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}
