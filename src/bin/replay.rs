//! Replay a CSV order-flow file through an engine and print the outcome.
//!
//! ```text
//! replay flow.csv --ticker ACME --minimum 0.01 --maximum 10.00
//! replay flow.csv --config books.json
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use rust_decimal::Decimal;
use sim_lob::{BookConfig, Currency, Price, Quote, Replay};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Replay order flow through the matching engine")]
struct Args {
    /// CSV file with `action,reference,ticker,owner,side,price,quantity,lifetime` rows
    path: PathBuf,

    /// JSON object mapping each ticker to its book configuration
    #[arg(long, conflicts_with_all = ["ticker", "minimum", "maximum"])]
    config: Option<PathBuf>,

    /// Instrument to list with a static book
    #[arg(long, requires_all = ["minimum", "maximum"])]
    ticker: Option<String>,

    /// Lowest admissible price
    #[arg(long)]
    minimum: Option<Decimal>,

    /// Highest admissible price
    #[arg(long)]
    maximum: Option<Decimal>,

    /// Price step in minor units
    #[arg(long, default_value_t = 1)]
    tick: u64,

    /// Resting order capacity
    #[arg(long, default_value_t = 128 * 1024)]
    capacity: u64,

    /// ISO code of the quoting currency
    #[arg(long, default_value = "USD")]
    currency: String,

    /// Depth levels to print per side
    #[arg(long, default_value_t = 10)]
    depth: usize,
}

fn books(args: &Args) -> Result<BTreeMap<String, BookConfig>, Box<dyn Error>> {
    if let Some(path) = &args.config {
        let file = File::open(path)?;
        return Ok(serde_json::from_reader(BufReader::new(file))?);
    }

    let (Some(ticker), Some(minimum), Some(maximum)) = (&args.ticker, args.minimum, args.maximum)
    else {
        return Err("either --config or --ticker with --minimum and --maximum is required".into());
    };
    let currency = Currency::from_code(&args.currency)
        .ok_or_else(|| format!("unknown currency {}", args.currency))?;
    let quote = |amount: Decimal| {
        Price::from_decimal(amount, currency)
            .map(|price| Quote::new(price, 1))
            .ok_or_else(|| format!("{amount} is not a whole number of minor units"))
    };

    let config = BookConfig::Static {
        minimum: quote(minimum)?,
        maximum: quote(maximum)?,
        tick: args.tick,
        capacity: args.capacity,
    };
    Ok(BTreeMap::from([(ticker.clone(), config)]))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut replay = Replay::new();
    for (ticker, config) in books(&args)? {
        replay.list(ticker, &config)?;
    }

    info!(path = %args.path.display(), "replaying order flow");
    let file = File::open(&args.path)?;
    let summary = replay.run(BufReader::new(file))?.clone();

    println!("=== Replay Summary ===");
    println!("Rows:       {}", summary.rows);
    println!("Skipped:    {}", summary.skipped);
    println!("Placements: {}", summary.placements);
    println!("Executions: {} ({} units)", summary.executions, summary.executed_quantity);
    println!("Cancels:    {}", summary.cancels);
    println!("Invalid:    {}", summary.invalid);

    let engine = replay.engine();
    for ticker in engine.tickers() {
        let Some(book) = engine.book(ticker) else {
            continue;
        };
        println!("\n=== {} ({} resting) ===", ticker, book.order_count());
        print!("{}", book.depth(args.depth));
    }

    Ok(())
}
