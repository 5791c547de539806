use clap::Parser;
use hdrhistogram::Histogram;
use ordlog_book::{Action, Bcd, Engine, EngineConfig, FeedEvent, LogRecord, NamedSnapshot, Side};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-event latency of the reconstruction engine", long_about = None)]
struct Args {
    /// Number of log records to process
    #[arg(short, long, default_value_t = 1_000_000)]
    iterations: u64,

    /// Number of distinct instruments in the synthetic feed
    #[arg(long, default_value_t = 64)]
    instruments: u64,

    /// Log records per transaction
    #[arg(long, default_value_t = 16)]
    txn_len: u64,
}

/// Synthetic record: adds early in each transaction, reduces late, so
/// levels stay bounded and positive.
fn synthetic_record(seq: u64, instruments: u64, txn_len: u64) -> LogRecord {
    let instrument = (seq % instruments) as i32;
    let side = if (seq / instruments) % 2 == 0 { Side::Bid } else { Side::Ask };
    let base = if side == Side::Bid { 10_000 } else { 10_100 };
    let price = Bcd::new(base + (seq % 50) as i64, 2);
    let action = if (seq / (instruments * 100)) % 2 == 0 { Action::Add } else { Action::Reduce };

    let mut record = LogRecord::new(instrument, side, action, price, 1);
    if seq % txn_len == txn_len - 1 {
        record.status = ordlog_book::OrderStatus::end_of_transaction();
    }
    record
}

fn ignore(_: &NamedSnapshot<'_>) {}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let txn_len = args.txn_len.max(1);

    println!("Preparing Latency Benchmark...");

    // Reduces mirror the earlier adds exactly, so every book must see them all
    let mut engine = Engine::new(EngineConfig::default().assume_ready(true));
    let mut sink = ignore;

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000, 3).unwrap();

    println!("Running {} iterations over {} instruments...", args.iterations, args.instruments);

    let mut total_duration = std::time::Duration::new(0, 0);

    for seq in 0..args.iterations {
        let event = FeedEvent::Log(synthetic_record(seq, args.instruments.max(1), txn_len));

        // Critical measurement section
        let start = Instant::now();
        let _ = std::hint::black_box(engine.process(event, &mut sink));
        let elapsed = start.elapsed();

        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;

        // Commits are timed too: they walk every book
        if seq % txn_len == txn_len - 1 {
            let start = Instant::now();
            let _ = std::hint::black_box(engine.process(FeedEvent::Commit, &mut sink));
            let elapsed = start.elapsed();
            histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
            total_duration += elapsed;
        }
    }

    let ops = histogram.len();
    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ops);
    println!("Throughput: {:.2} ops/sec", ops as f64 / total_duration.as_secs_f64());
    println!("Snapshots:  {}", engine.stats().snapshots);
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
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:8} ns: {:10} count", v.value_iterated_to(), count);
        }
    }
}
