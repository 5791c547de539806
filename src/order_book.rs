//! Order Book - ladder, readiness and consistency of one instrument.

use crate::command::{Action, InstrumentId, LogRecord, Snapshot};
use crate::decimal::Price;
use crate::error::ConsistencyViolation;
use crate::ladder::{LevelUpdate, PriceLadder};
use crate::readiness::Readiness;

/// Per-instrument reconstruction state.
///
/// `consistent` is only true between a commit-time snapshot and the next
/// applied delta. A halted book has diverged from the log and is never
/// mutated or snapshotted again.
#[derive(Clone, Debug, Default)]
pub struct OrderBook {
    ladder: PriceLadder,
    readiness: Readiness,
    consistent: bool,
    halted: Option<ConsistencyViolation>,
}

impl OrderBook {
    /// Create an empty book in the given readiness state.
    pub fn new(readiness: Readiness) -> Self {
        Self {
            readiness,
            ..Self::default()
        }
    }

    // ========================================================================
    // State Access
    // ========================================================================

    #[inline]
    pub fn ladder(&self) -> &PriceLadder {
        &self.ladder
    }

    #[inline]
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The violation that halted this book, if any
    #[inline]
    pub fn halt_reason(&self) -> Option<&ConsistencyViolation> {
        self.halted.as_ref()
    }

    #[inline]
    pub fn best_bid(&self) -> Price {
        self.ladder.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Price {
        self.ladder.best_ask()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Feed the end-of-transaction flag of a record that arrived while the
    /// book was not ready.
    #[inline]
    pub fn observe_gated(&mut self, end_of_transaction: bool) -> bool {
        self.readiness.on_record(end_of_transaction)
    }

    /// Advance readiness on a commit boundary.
    #[inline]
    pub fn advance_on_commit(&mut self) -> bool {
        self.readiness.on_commit()
    }

    /// Mark the book permanently inconsistent.
    pub fn halt(&mut self, violation: ConsistencyViolation) {
        self.consistent = false;
        if self.halted.is_none() {
            self.halted = Some(violation);
        }
    }

    /// Take the commit-time snapshot and mark the book consistent.
    pub fn snapshot(&mut self, instrument: InstrumentId) -> Snapshot {
        self.consistent = true;
        Snapshot {
            instrument,
            best_bid: self.ladder.best_bid(),
            best_ask: self.ladder.best_ask(),
        }
    }

    // ========================================================================
    // Ladder Mutation
    // ========================================================================

    /// Apply a record to the ladder. The caller has already checked that the
    /// book is ready and decoded the price.
    ///
    /// # Errors
    /// A `ConsistencyViolation` if a delete breaks its contract or a delta
    /// would drive a level negative or past `u64::MAX`. The ladder is not
    /// changed in that case.
    pub fn apply(&mut self, record: &LogRecord, price: Price) -> Result<u64, ConsistencyViolation> {
        let instrument = record.instrument;

        let update = match record.action {
            Action::Add => match record.amount_rest {
                Some(rest) => LevelUpdate::Absolute(rest),
                None => LevelUpdate::Delta(i128::from(record.amount)),
            },
            Action::Delete => {
                if record.amount == 0 {
                    return Err(ConsistencyViolation::EmptyDelete { instrument, price });
                }
                if record.amount_rest != Some(0) {
                    return Err(ConsistencyViolation::DeleteWithRemainder {
                        instrument,
                        price,
                        remaining: record.amount_rest,
                    });
                }
                LevelUpdate::Delta(-i128::from(record.amount))
            }
            Action::Reduce => LevelUpdate::Delta(-i128::from(record.amount)),
        };

        let volume = self
            .ladder
            .apply(record.side, price, update)
            .map_err(|source| ConsistencyViolation::Ladder { instrument, source })?;

        // Mid-assembly: not safe to read until the next commit
        self.consistent = false;
        Ok(volume)
    }

    /// Verify the ladder invariant, halting the book on failure.
    pub fn verify(&mut self, instrument: InstrumentId) -> Result<(), ConsistencyViolation> {
        if let Err(source) = self.ladder.verify() {
            let violation = ConsistencyViolation::Ladder { instrument, source };
            self.halt(violation);
            return Err(violation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Side;
    use crate::decimal::Bcd;
    use crate::error::LadderError;

    fn record(side: Side, action: Action, amount: u64) -> LogRecord {
        LogRecord::new(7, side, action, Bcd::new(10000, 2), amount)
    }

    fn ready_book() -> OrderBook {
        OrderBook::new(Readiness::Ready)
    }

    #[test]
    fn test_new_book() {
        let book = OrderBook::new(Readiness::NotReady);
        assert_eq!(book.readiness(), Readiness::NotReady);
        assert!(!book.is_consistent());
        assert!(!book.is_halted());
        assert!(book.ladder().is_empty());
    }

    #[test]
    fn test_add_then_reduce_then_delete() {
        let mut book = ready_book();
        let price = Price::new(100.0);

        assert_eq!(book.apply(&record(Side::Bid, Action::Add, 10), price), Ok(10));
        assert_eq!(book.apply(&record(Side::Bid, Action::Reduce, 4), price), Ok(6));
        let delete = record(Side::Bid, Action::Delete, 6).with_amount_rest(0);
        assert_eq!(book.apply(&delete, price), Ok(0));

        assert!(book.ladder().is_empty());
    }

    #[test]
    fn test_add_with_remainder_is_absolute() {
        let mut book = ready_book();
        let price = Price::new(100.0);

        book.apply(&record(Side::Ask, Action::Add, 3), price).unwrap();
        let add = record(Side::Ask, Action::Add, 5).with_amount_rest(7);
        assert_eq!(book.apply(&add, price), Ok(7));
        assert_eq!(book.ladder().volume_at(Side::Ask, price), 7);
    }

    #[test]
    fn test_full_width_amounts() {
        let mut book = ready_book();
        let price = Price::new(100.0);

        assert_eq!(book.apply(&record(Side::Ask, Action::Add, u64::MAX), price), Ok(u64::MAX));
        assert_eq!(book.ladder().volume_at(Side::Ask, price), u64::MAX);

        let err = book.apply(&record(Side::Ask, Action::Add, 1), price).unwrap_err();
        assert!(matches!(
            err,
            ConsistencyViolation::Ladder {
                source: LadderError::VolumeOverflow { current: u64::MAX, .. },
                ..
            }
        ));
        assert_eq!(book.ladder().volume_at(Side::Ask, price), u64::MAX);

        assert_eq!(book.apply(&record(Side::Ask, Action::Reduce, u64::MAX), price), Ok(0));
        assert!(book.ladder().is_empty());
    }

    #[test]
    fn test_empty_delete_is_violation() {
        let mut book = ready_book();
        let price = Price::new(100.0);
        book.apply(&record(Side::Bid, Action::Add, 5), price).unwrap();

        let delete = record(Side::Bid, Action::Delete, 0).with_amount_rest(0);
        let err = book.apply(&delete, price).unwrap_err();
        assert!(matches!(err, ConsistencyViolation::EmptyDelete { instrument: 7, .. }));
        assert_eq!(book.ladder().volume_at(Side::Bid, price), 5);
    }

    #[test]
    fn test_delete_with_remainder_is_violation() {
        let mut book = ready_book();
        let price = Price::new(100.0);
        book.apply(&record(Side::Bid, Action::Add, 5), price).unwrap();

        let delete = record(Side::Bid, Action::Delete, 2).with_amount_rest(3);
        assert!(matches!(
            book.apply(&delete, price),
            Err(ConsistencyViolation::DeleteWithRemainder { remaining: Some(3), .. })
        ));

        let delete = record(Side::Bid, Action::Delete, 2);
        assert!(matches!(
            book.apply(&delete, price),
            Err(ConsistencyViolation::DeleteWithRemainder { remaining: None, .. })
        ));
        assert_eq!(book.ladder().volume_at(Side::Bid, price), 5);
    }

    #[test]
    fn test_snapshot_and_consistency() {
        let mut book = ready_book();
        book.apply(&record(Side::Bid, Action::Add, 5), Price::new(100.0)).unwrap();
        assert!(!book.is_consistent());

        let snap = book.snapshot(7);
        assert!(book.is_consistent());
        assert_eq!(snap.best_bid, Price::new(100.0));
        assert_eq!(snap.best_ask, Price::ZERO);

        // Any mutation clears it
        book.apply(&record(Side::Ask, Action::Add, 1), Price::new(101.0)).unwrap();
        assert!(!book.is_consistent());
    }

    #[test]
    fn test_halt_keeps_first_reason() {
        let mut book = ready_book();
        let first = ConsistencyViolation::EmptyDelete { instrument: 7, price: Price::new(1.0) };
        let second = ConsistencyViolation::EmptyDelete { instrument: 7, price: Price::new(2.0) };
        book.halt(first);
        book.halt(second);
        assert!(book.is_halted());
        assert_eq!(book.halt_reason(), Some(&first));
    }
}
