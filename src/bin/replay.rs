use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use ordlog_book::replay::{self, ReplayEvent};
use ordlog_book::{ContractKind, Engine, EngineConfig, NamedSnapshot, SnapshotSink};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay an order-log CSV and print best bid/ask at every commit", long_about = None)]
struct Args {
    /// Order-log CSV (kind,isin_id,dir,action,status,price,amount,amount_rest,moment)
    #[arg(short, long)]
    orders: PathBuf,

    /// Futures reference data CSV (isin_id,name,short_isin,lot_volume)
    #[arg(long)]
    futures: Option<PathBuf>,

    /// Options reference data CSV (isin_id,name,short_isin,lot_volume)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Trust the log from the first record instead of waiting for a transaction boundary
    #[arg(long)]
    assume_ready: bool,

    /// Check ladder invariants before every snapshot
    #[arg(long)]
    verify: bool,

    /// Print only the final statistics
    #[arg(short, long)]
    quiet: bool,

    /// Run the engine on its own pinned thread behind ring buffers
    #[cfg(feature = "runtime")]
    #[arg(long)]
    threaded: bool,
}

/// Tab-separated snapshot lines: id, bid, ask, name
struct TsvPrinter<W: Write> {
    out: W,
    quiet: bool,
    error: Option<io::Error>,
}

impl<W: Write> TsvPrinter<W> {
    fn new(out: W, quiet: bool) -> Self {
        Self { out, quiet, error: None }
    }

    fn write_line(&mut self, id: i32, bid: f64, ask: f64, name: Option<&str>) {
        if self.quiet || self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}\t{}\t{}\t{}", id, bid, ask, name.unwrap_or("")) {
            self.error = Some(e);
        }
    }

    fn finish(mut self) -> io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()
    }
}

impl<W: Write> SnapshotSink for TsvPrinter<W> {
    fn emit(&mut self, s: &NamedSnapshot<'_>) {
        self.write_line(s.instrument(), s.best_bid().value(), s.best_ask().value(), s.name);
    }
}

fn load_metadata(engine: &mut Engine, args: &Args) -> Result<()> {
    for (path, kind) in [(&args.futures, ContractKind::Future), (&args.options, ContractKind::Option)] {
        if let Some(path) = path {
            let rows = replay::open_instruments(path, kind)
                .with_context(|| format!("Failed to read {:?} reference data from {}", kind, path.display()))?;
            info!("Loaded {} {:?} instruments from {}", rows.len(), kind, path.display());
            for row in rows {
                engine.on_metadata(row);
            }
        }
    }
    Ok(())
}

fn run_inline(engine: &mut Engine, events: &[ReplayEvent], printer: &mut TsvPrinter<impl Write>) {
    for ev in events {
        // Failures are confined to one instrument; the reconstructor has logged them
        let _ = engine.process(ev.event, printer);
    }
}

#[cfg(feature = "runtime")]
fn run_threaded(mut engine: Engine, events: Vec<ReplayEvent>, printer: &mut TsvPrinter<impl Write>) -> Result<Engine> {
    use ordlog_book::EngineInput;

    let (mut in_tx, mut in_rx) = rtrb::RingBuffer::<EngineInput>::new(1 << 16);
    let (mut out_tx, mut out_rx) = rtrb::RingBuffer::new(1 << 16);

    let handle = std::thread::spawn(move || {
        engine.run(&mut in_rx, &mut out_tx, true);
        engine
    });

    let mut drain = |out_rx: &mut rtrb::Consumer<ordlog_book::OwnedSnapshot>| {
        while let Ok(s) = out_rx.pop() {
            printer.write_line(
                s.snapshot.instrument,
                s.snapshot.best_bid.value(),
                s.snapshot.best_ask.value(),
                s.name.as_deref(),
            );
        }
    };

    // The engine stalls on a full output ring, so drain on every push
    for ev in events {
        let mut item = EngineInput::Feed(ev.event);
        loop {
            drain(&mut out_rx);
            match in_tx.push(item) {
                Ok(()) => break,
                Err(rtrb::PushError::Full(back)) => {
                    item = back;
                    std::hint::spin_loop();
                }
            }
        }
    }
    drop(in_tx);

    while !handle.is_finished() {
        drain(&mut out_rx);
        std::hint::spin_loop();
    }
    let engine = handle
        .join()
        .map_err(|_| anyhow::anyhow!("engine thread panicked"))?;
    drain(&mut out_rx);
    Ok(engine)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = EngineConfig::default()
        .assume_ready(args.assume_ready)
        .verify_on_commit(args.verify);
    if config.assume_ready {
        warn!("Books start Ready: the first transaction may be partially observed");
    }
    let mut engine = Engine::new(config);
    load_metadata(&mut engine, &args)?;

    let feed = replay::open_feed(&args.orders)
        .with_context(|| format!("Failed to read order log from {}", args.orders.display()))?;
    let rejected_rows = feed.rejected;
    let events = feed.events;
    info!("Replaying {} events from {}", events.len(), args.orders.display());
    if let (Some(first), Some(last)) = (
        events.iter().find_map(|e| e.moment),
        events.iter().rev().find_map(|e| e.moment),
    ) {
        info!("Exchange time span: {} .. {}", first, last);
    }

    let stdout = io::stdout();
    let mut printer = TsvPrinter::new(BufWriter::new(stdout.lock()), args.quiet);

    #[cfg(feature = "runtime")]
    let engine = if args.threaded {
        run_threaded(engine, events, &mut printer)?
    } else {
        run_inline(&mut engine, &events, &mut printer);
        engine
    };
    #[cfg(not(feature = "runtime"))]
    run_inline(&mut engine, &events, &mut printer);

    printer.finish().context("Failed to write snapshots")?;

    let stats = engine.stats();
    eprintln!("=== Replay Summary ===");
    eprintln!("Instruments:     {}", engine.instrument_count());
    eprintln!("Records:         {}", stats.records);
    eprintln!("  applied:       {}", stats.applied);
    eprintln!("  gated:         {}", stats.gated);
    eprintln!("  non-system:    {}", stats.non_system);
    eprintln!("  halted skips:  {}", stats.skipped_halted);
    eprintln!("Commits:         {}", stats.commits);
    eprintln!("Snapshots:       {}", stats.snapshots);
    eprintln!("Decode errors:   {}", stats.decode_errors);
    eprintln!("Rejected rows:   {}", rejected_rows);
    eprintln!("Violations:      {}", stats.violations);

    Ok(())
}
