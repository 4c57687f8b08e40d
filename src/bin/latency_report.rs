use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;
use sim_lob::{
    Currency, Lifetime, LimitOrder, OrderBook, Price, Quote, Side, StaticOrderBook, TreeOrderBook,
};
use std::error::Error;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Variant {
    Static,
    Tree,
}

/// Insert latency percentiles for one book variant.
#[derive(Parser, Debug)]
#[command(name = "latency-report")]
struct Args {
    /// Book variant to measure
    #[arg(long, value_enum, default_value = "static")]
    variant: Variant,

    /// Number of inserts to time
    #[arg(long, default_value_t = 1_000_000)]
    iterations: u64,

    /// Resting order capacity of the static book
    #[arg(long, default_value_t = 100_000)]
    capacity: u64,
}

fn usd(cents: i64) -> Quote {
    Quote::new(Price::new(cents, Currency::USD), 1)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();

    println!("Preparing Latency Benchmark ({:?} book)...", args.variant);

    let mut book: Box<dyn OrderBook> = match args.variant {
        // 0.01 .. 2000.00
        Variant::Static => Box::new(StaticOrderBook::new(usd(1), usd(200_000), args.capacity)?),
        Variant::Tree => Box::new(TreeOrderBook::new(Currency::USD, 1)?),
    };

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3)?;

    println!("Running {} iterations...", args.iterations);

    let mut total_duration = Duration::new(0, 0);

    for i in 0..args.iterations {
        // Alternating sides around 100.00 keep the book shallow
        let order = LimitOrder::new(
            "BENCH",
            1,
            if i % 2 == 0 { Side::Buy } else { Side::Sell },
            usd(10_000 + (i % 100) as i64),
            10,
            Lifetime::GoodUntilCancelled,
        );

        // Critical measurement section
        let start = Instant::now();
        let result = std::hint::black_box(book.insert(&order));
        let elapsed = start.elapsed();

        book.clear_reports();
        result?;

        // Outliers beyond the histogram bound are dropped
        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", args.iterations);
    println!(
        "Throughput: {:.2} ops/sec",
        args.iterations as f64 / total_duration.as_secs_f64()
    );
    println!("Resting:    {} orders", book.order_count());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    let mut lower = 0;
    for v in histogram.iter_log(100, 2.0) {
        let upper = v.value_iterated_to();
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("{:6} ns - {:6} ns: {:10} count", lower, upper, count);
        }
        lower = upper + 1;
    }

    Ok(())
}
