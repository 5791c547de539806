//! Reconstructor - routes order-log records to per-instrument books.
//!
//! Implements the dispatch algorithm:
//! 1. DECODE: fixed-point price to `Price`
//! 2. FILTER: drop non-system records
//! 3. ROUTE: look up (or create) the instrument's book
//! 4. APPLY or GATE: mutate the ladder if ready, else feed readiness

use std::collections::BTreeMap;

use log::{debug, error, warn};

use crate::command::{InstrumentId, LogRecord, Snapshot};
use crate::config::EngineConfig;
use crate::error::{ReconstructError, Result};
use crate::order_book::OrderBook;

/// What happened to one record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Ladder mutated; carries the level's new volume
    Applied { volume: u64 },
    /// Book not ready; only the end-of-transaction flag was inspected
    Gated,
    /// Non-system record, never routed
    Ignored,
    /// Book halted by an earlier violation
    Skipped,
}

/// Running counters across all instruments
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconstructorStats {
    pub records: u64,
    pub non_system: u64,
    pub applied: u64,
    pub gated: u64,
    pub decode_errors: u64,
    pub violations: u64,
    pub skipped_halted: u64,
    pub commits: u64,
    pub snapshots: u64,
}

/// The reconstruction core: one book per instrument id.
///
/// Books are created on first sight and live as long as the reconstructor.
/// The map is ordered so commits walk instruments by ascending id.
pub struct Reconstructor {
    books: BTreeMap<InstrumentId, OrderBook>,
    config: EngineConfig,
    stats: ReconstructorStats,
}

impl Reconstructor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            books: BTreeMap::new(),
            config,
            stats: ReconstructorStats::default(),
        }
    }

    /// Process one order-log record.
    ///
    /// # Errors
    /// A decode failure rejects this record only. A consistency violation
    /// halts the record's instrument; every other instrument keeps going.
    pub fn process_record(&mut self, record: &LogRecord) -> Result<RecordOutcome> {
        self.stats.records += 1;
        let instrument = record.instrument;

        let price = match record.price.decode() {
            Ok(price) => price,
            Err(source) => {
                self.stats.decode_errors += 1;
                warn!("instrument {}: dropping record: {}", instrument, source);
                return Err(ReconstructError::Decode { instrument, source });
            }
        };

        if record.status.non_system {
            self.stats.non_system += 1;
            return Ok(RecordOutcome::Ignored);
        }

        let initial = self.config.initial_readiness();
        let book = self
            .books
            .entry(instrument)
            .or_insert_with(|| OrderBook::new(initial));

        if book.is_halted() {
            self.stats.skipped_halted += 1;
            debug!("instrument {}: halted, skipping record", instrument);
            return Ok(RecordOutcome::Skipped);
        }

        if !book.readiness().is_ready() {
            self.stats.gated += 1;
            if book.observe_gated(record.status.end_of_transaction) {
                debug!("instrument {}: end of transaction seen, almost ready", instrument);
            }
            return Ok(RecordOutcome::Gated);
        }

        match book.apply(record, price) {
            Ok(volume) => {
                self.stats.applied += 1;
                Ok(RecordOutcome::Applied { volume })
            }
            Err(violation) => {
                self.stats.violations += 1;
                error!("halting instrument {}: {}", instrument, violation);
                book.halt(violation);
                Err(violation.into())
            }
        }
    }

    /// Handle a transaction commit.
    ///
    /// Every book that was ready before this commit becomes consistent and
    /// is appended to `out`. Books that were almost ready are promoted, and
    /// are snapshotted from the next commit onward.
    pub fn commit(&mut self, out: &mut Vec<Snapshot>) {
        self.stats.commits += 1;
        let verify = self.config.verify_on_commit;

        for (&instrument, book) in self.books.iter_mut() {
            if book.readiness().is_ready() && !book.is_halted() {
                match verify.then(|| book.verify(instrument)) {
                    Some(Err(violation)) => {
                        self.stats.violations += 1;
                        error!("halting instrument {}: {}", instrument, violation);
                    }
                    _ => {
                        out.push(book.snapshot(instrument));
                        self.stats.snapshots += 1;
                    }
                }
            }

            if book.advance_on_commit() {
                debug!("instrument {}: ready for assembly", instrument);
            }
        }
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    #[inline]
    pub fn book(&self, instrument: InstrumentId) -> Option<&OrderBook> {
        self.books.get(&instrument)
    }

    /// Books in ascending instrument order
    pub fn books(&self) -> impl Iterator<Item = (InstrumentId, &OrderBook)> + '_ {
        self.books.iter().map(|(id, book)| (*id, book))
    }

    #[inline]
    pub fn instrument_count(&self) -> usize {
        self.books.len()
    }

    #[inline]
    pub fn stats(&self) -> &ReconstructorStats {
        &self.stats
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute a hash of every book (for determinism testing)
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        for (id, book) in &self.books {
            id.hash(&mut hasher);
            book.readiness().hash(&mut hasher);
            book.is_consistent().hash(&mut hasher);
            book.is_halted().hash(&mut hasher);
            for side in [crate::command::Side::Bid, crate::command::Side::Ask] {
                for (price, volume) in book.ladder().levels(side) {
                    price.hash(&mut hasher);
                    volume.hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Action, OrderStatus, Side};
    use crate::decimal::{Bcd, Price};
    use crate::error::{ConsistencyViolation, DecodeError};
    use crate::readiness::Readiness;

    fn add(instrument: InstrumentId, side: Side, mantissa: i64, amount: u64) -> LogRecord {
        LogRecord::new(instrument, side, Action::Add, Bcd::new(mantissa, 2), amount)
    }

    fn eot(record: LogRecord) -> LogRecord {
        record.with_status(OrderStatus::end_of_transaction())
    }

    fn commit(rec: &mut Reconstructor) -> Vec<Snapshot> {
        let mut out = Vec::new();
        rec.commit(&mut out);
        out
    }

    /// Walk one instrument to `Ready`
    fn make_ready(rec: &mut Reconstructor, instrument: InstrumentId) {
        rec.process_record(&eot(add(instrument, Side::Bid, 1, 1))).unwrap();
        commit(rec);
        assert_eq!(rec.book(instrument).unwrap().readiness(), Readiness::Ready);
    }

    #[test]
    fn test_books_start_not_ready() {
        let mut rec = Reconstructor::default();
        let outcome = rec.process_record(&add(1, Side::Bid, 10000, 5)).unwrap();

        assert_eq!(outcome, RecordOutcome::Gated);
        let book = rec.book(1).unwrap();
        assert_eq!(book.readiness(), Readiness::NotReady);
        assert!(book.ladder().is_empty());
    }

    #[test]
    fn test_assume_ready_applies_immediately() {
        let mut rec = Reconstructor::new(EngineConfig::default().assume_ready(true));
        let outcome = rec.process_record(&add(1, Side::Bid, 10000, 5)).unwrap();
        assert_eq!(outcome, RecordOutcome::Applied { volume: 5 });
    }

    #[test]
    fn test_non_system_never_routed() {
        let mut rec = Reconstructor::default();
        let record = add(1, Side::Bid, 10000, 5)
            .with_status(OrderStatus::from_bits(0x1004)); // non-system + end-of-transaction

        assert_eq!(rec.process_record(&record), Ok(RecordOutcome::Ignored));
        assert!(rec.book(1).is_none());
        assert_eq!(rec.stats().non_system, 1);
    }

    #[test]
    fn test_decode_error_rejects_record() {
        let mut rec = Reconstructor::default();
        let mut record = add(1, Side::Bid, 10000, 5);
        record.price = Bcd::new(10000, 8);
        record.status = OrderStatus::end_of_transaction();

        let err = rec.process_record(&record).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::Decode { instrument: 1, source: DecodeError::ScaleOutOfRange(8) }
        );
        assert!(rec.book(1).is_none());
        assert_eq!(rec.stats().decode_errors, 1);
    }

    #[test]
    fn test_promoted_book_not_snapshotted_same_commit() {
        let mut rec = Reconstructor::default();
        rec.process_record(&eot(add(3, Side::Ask, 100, 1))).unwrap();

        assert!(commit(&mut rec).is_empty());
        assert_eq!(rec.book(3).unwrap().readiness(), Readiness::Ready);

        let snaps = commit(&mut rec);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].instrument, 3);
        // Records seen before Ready never reached the ladder
        assert_eq!(snaps[0].best_ask, Price::ZERO);
    }

    #[test]
    fn test_violation_halts_only_that_instrument() {
        let mut rec = Reconstructor::default();
        make_ready(&mut rec, 1);
        make_ready(&mut rec, 2);

        rec.process_record(&add(1, Side::Bid, 10000, 5)).unwrap();
        rec.process_record(&add(2, Side::Bid, 20000, 5)).unwrap();

        let bad = LogRecord::new(1, Side::Bid, Action::Delete, Bcd::new(10000, 2), 0)
            .with_amount_rest(0);
        let err = rec.process_record(&bad).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::Consistency(ConsistencyViolation::EmptyDelete { instrument: 1, .. })
        ));
        assert!(rec.book(1).unwrap().is_halted());
        assert_eq!(rec.book(1).unwrap().ladder().volume_at(Side::Bid, Price::new(100.0)), 5);

        // Halted book skips further records and is excluded from snapshots
        assert_eq!(rec.process_record(&add(1, Side::Bid, 10000, 1)), Ok(RecordOutcome::Skipped));
        let snaps = commit(&mut rec);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].instrument, 2);
        assert_eq!(snaps[0].best_bid, Price::new(200.0));
    }

    #[test]
    fn test_commit_walks_in_instrument_order() {
        let mut rec = Reconstructor::default();
        for id in [30, 10, 20] {
            make_ready(&mut rec, id);
        }
        let ids: Vec<_> = commit(&mut rec).iter().map(|s| s.instrument).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_stats_and_state_hash() {
        let mut rec = Reconstructor::default();
        make_ready(&mut rec, 1);
        rec.process_record(&add(1, Side::Bid, 10000, 5)).unwrap();
        commit(&mut rec);

        let stats = rec.stats();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.gated, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.commits, 2);
        assert_eq!(stats.snapshots, 1);

        let mut other = Reconstructor::default();
        make_ready(&mut other, 1);
        other.process_record(&add(1, Side::Bid, 10000, 5)).unwrap();
        commit(&mut other);
        assert_eq!(rec.state_hash(), other.state_hash());
    }
}
