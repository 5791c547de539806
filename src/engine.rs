//! Engine - reconstruction core plus metadata, with an optional event loop.
//!
//! Wraps the reconstructor with I/O handling via rtrb ring buffers.

use crate::command::{FeedEvent, InstrumentId, Snapshot};
use crate::config::EngineConfig;
use crate::decimal::Price;
use crate::emitter::{emit_snapshots, SnapshotSink};
use crate::error::Result;
use crate::metadata::{InstrumentDirectory, MetadataEvent};
use crate::order_book::OrderBook;
use crate::reconstructor::{ReconstructorStats, Reconstructor};

/// Anything the transport can deliver to the engine thread.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineInput {
    Feed(FeedEvent),
    Metadata(MetadataEvent),
}

/// Forwards snapshots into the output ring.
///
/// Spins while the ring is full so the consumer sees every snapshot. Only a
/// consumer that has gone away causes snapshots to be dropped.
#[cfg(feature = "runtime")]
struct RingSink<'a> {
    output: &'a mut rtrb::Producer<crate::emitter::OwnedSnapshot>,
}

#[cfg(feature = "runtime")]
impl SnapshotSink for RingSink<'_> {
    fn emit(&mut self, s: &crate::emitter::NamedSnapshot<'_>) {
        let mut item = s.to_owned_snapshot();
        loop {
            match self.output.push(item) {
                Ok(()) => return,
                Err(rtrb::PushError::Full(back)) => {
                    if self.output.is_abandoned() {
                        log::warn!("snapshot consumer gone, dropping instrument {}", s.instrument());
                        return;
                    }
                    item = back;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

/// The engine that owns every book and the instrument directory.
///
/// Single writer: all methods take `&mut self` and never block.
pub struct Engine {
    /// The underlying reconstruction core
    pub reconstructor: Reconstructor,
    /// Display names from the reference feeds
    pub directory: InstrumentDirectory,
    /// Reused buffer for commit-time snapshots
    scratch: Vec<Snapshot>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            directory: InstrumentDirectory::with_capacity(config.expected_instruments),
            reconstructor: Reconstructor::new(config),
            scratch: Vec::new(),
        }
    }

    /// Run the engine event loop until the producer side is dropped and
    /// the input ring is drained.
    ///
    /// Back-pressure: a full output ring stalls the loop until the
    /// consumer pops, so the consumer must keep draining.
    ///
    /// # Arguments
    /// * `input` - Consumer end of the input ring buffer
    /// * `output` - Producer end of the snapshot ring buffer
    /// * `pin_to_core` - Whether to pin to the last available CPU core
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<EngineInput>,
        output: &mut rtrb::Producer<crate::emitter::OwnedSnapshot>,
        pin_to_core: bool,
    ) {
        if pin_to_core {
            self.pin_to_core();
        }

        let mut forward = RingSink { output };

        loop {
            while let Ok(item) = input.pop() {
                match item {
                    EngineInput::Feed(event) => {
                        // Errors are already logged and confined to one instrument
                        let _ = self.process(event, &mut forward);
                    }
                    EngineInput::Metadata(event) => self.on_metadata(event),
                }
            }
            if input.is_abandoned() && input.is_empty() {
                break;
            }
            std::hint::spin_loop();
        }
    }

    /// Process a single feed event.
    ///
    /// This is the main entry point for synchronous usage (testing, benchmarks).
    ///
    /// # Returns
    /// Number of snapshots handed to `sink` (always 0 for log records).
    pub fn process<S: SnapshotSink + ?Sized>(&mut self, event: FeedEvent, sink: &mut S) -> Result<usize> {
        match event {
            FeedEvent::Log(record) => {
                self.reconstructor.process_record(&record)?;
                Ok(0)
            }
            FeedEvent::Commit => {
                self.scratch.clear();
                self.reconstructor.commit(&mut self.scratch);
                Ok(emit_snapshots(&self.scratch, &self.directory, sink))
            }
        }
    }

    /// Apply a reference-feed row.
    pub fn on_metadata(&mut self, event: MetadataEvent) {
        self.directory.apply(event);
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                core_affinity::set_for_current(*last_core);
            }
        }
    }

    #[inline]
    pub fn book(&self, instrument: InstrumentId) -> Option<&OrderBook> {
        self.reconstructor.book(instrument)
    }

    /// Get the best bid price (0 for an unknown instrument).
    #[inline]
    pub fn best_bid(&self, instrument: InstrumentId) -> Price {
        self.book(instrument).map_or(Price::ZERO, OrderBook::best_bid)
    }

    /// Get the best ask price (0 for an unknown instrument).
    #[inline]
    pub fn best_ask(&self, instrument: InstrumentId) -> Price {
        self.book(instrument).map_or(Price::ZERO, OrderBook::best_ask)
    }

    #[inline]
    pub fn instrument_count(&self) -> usize {
        self.reconstructor.instrument_count()
    }

    #[inline]
    pub fn stats(&self) -> &ReconstructorStats {
        self.reconstructor.stats()
    }

    /// Compute state hash for determinism testing.
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.reconstructor.state_hash()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Action, LogRecord, OrderStatus, Side};
    use crate::decimal::Bcd;
    use crate::emitter::SnapshotLog;
    use crate::metadata::{ContractKind, InstrumentInfo};

    fn add(instrument: InstrumentId, mantissa: i64, amount: u64) -> FeedEvent {
        FeedEvent::Log(LogRecord::new(instrument, Side::Bid, Action::Add, Bcd::new(mantissa, 2), amount))
    }

    #[test]
    fn test_engine_creation() {
        let engine = Engine::default();
        assert_eq!(engine.instrument_count(), 0);
        assert_eq!(engine.best_bid(1), Price::ZERO);
        assert_eq!(engine.best_ask(1), Price::ZERO);
    }

    #[test]
    fn test_engine_emits_named_snapshots() {
        let mut engine = Engine::default();
        let mut log = SnapshotLog::new();

        engine.on_metadata(MetadataEvent {
            kind: ContractKind::Future,
            info: InstrumentInfo::new(100, "RTS-12.26"),
        });

        let marker = LogRecord::new(100, Side::Bid, Action::Add, Bcd::new(1, 0), 1)
            .with_status(OrderStatus::end_of_transaction());
        engine.process(FeedEvent::Log(marker), &mut log).unwrap();
        assert_eq!(engine.process(FeedEvent::Commit, &mut log), Ok(0));

        engine.process(add(100, 10000, 5), &mut log).unwrap();
        assert_eq!(engine.process(FeedEvent::Commit, &mut log), Ok(1));

        let snap = &log.snapshots[0];
        assert_eq!(snap.name.as_deref(), Some("RTS-12.26"));
        assert_eq!(snap.snapshot.best_bid, Price::new(100.0));
        assert_eq!(engine.best_bid(100), Price::new(100.0));
    }

    #[test]
    fn test_engine_state_hash_determinism() {
        let config = EngineConfig::default().assume_ready(true);
        let mut engine1 = Engine::new(config);
        let mut engine2 = Engine::new(config);
        let mut sink = SnapshotLog::new();

        for i in 0..100 {
            let event = add((i % 7) as InstrumentId, 10000 + (i % 10) * 5, 10);
            engine1.process(event, &mut sink).unwrap();
            engine2.process(event, &mut sink).unwrap();
        }

        assert_eq!(engine1.state_hash(), engine2.state_hash());
    }

    #[cfg(feature = "runtime")]
    #[test]
    fn test_run_over_rings_matches_inline() {
        use crate::emitter::OwnedSnapshot;

        const INSTRUMENTS: InstrumentId = 50;
        let mut feed = Vec::new();
        for id in 0..INSTRUMENTS {
            let marker = LogRecord::new(id, Side::Bid, Action::Add, Bcd::new(1, 0), 1)
                .with_status(OrderStatus::end_of_transaction());
            feed.push(FeedEvent::Log(marker));
        }
        feed.push(FeedEvent::Commit);
        for round in 0..20 {
            for id in 0..INSTRUMENTS {
                feed.push(add(id, 10000 + round, 1));
            }
            feed.push(FeedEvent::Commit);
        }

        let mut inline = Engine::default();
        let mut expected = SnapshotLog::new();
        for event in &feed {
            inline.process(*event, &mut expected).unwrap();
        }
        assert_eq!(expected.len(), 20 * INSTRUMENTS as usize);

        // Output ring far smaller than one commit's worth of snapshots
        let (mut in_tx, mut in_rx) = rtrb::RingBuffer::<EngineInput>::new(8);
        let (mut out_tx, mut out_rx) = rtrb::RingBuffer::<OwnedSnapshot>::new(4);
        let handle = std::thread::spawn(move || {
            let mut engine = Engine::default();
            engine.run(&mut in_rx, &mut out_tx, false);
            engine
        });

        let mut received = Vec::new();
        for event in feed {
            let mut item = EngineInput::Feed(event);
            loop {
                while let Ok(s) = out_rx.pop() {
                    received.push(s);
                }
                match in_tx.push(item) {
                    Ok(()) => break,
                    Err(rtrb::PushError::Full(back)) => item = back,
                }
            }
        }
        drop(in_tx);

        while !handle.is_finished() {
            while let Ok(s) = out_rx.pop() {
                received.push(s);
            }
        }
        let threaded = handle.join().unwrap();
        while let Ok(s) = out_rx.pop() {
            received.push(s);
        }

        assert_eq!(received, expected.snapshots);
        assert_eq!(threaded.state_hash(), inline.state_hash());
        assert_eq!(threaded.stats().snapshots, received.len() as u64);
    }
}
