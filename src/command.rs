//! Feed and output types for the reconstruction engine.
//!
//! Feed events are inputs from the transport.
//! Snapshots are outputs to the presentation layer.

use crate::decimal::{Bcd, Price};

/// Exchange instrument key (`isin_id` on the feed)
pub type InstrumentId = i32;

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Decode the feed's direction field: 1 is buy, anything else is sell.
    #[inline]
    pub const fn from_dir(dir: i8) -> Self {
        if dir == 1 {
            Side::Bid
        } else {
            Side::Ask
        }
    }

    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// What an order-log record does to the resting order it names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Order removed from the book
    Delete = 0,
    /// New resting order
    Add = 1,
    /// Partial fill or amount decrease
    Reduce = 2,
}

impl Action {
    /// Decode the feed's action code.
    #[inline]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Action::Delete),
            1 => Some(Action::Add),
            2 => Some(Action::Reduce),
            _ => None,
        }
    }
}

// ============================================================================
// Order Status
// ============================================================================

/// Raw status bits as they appear on the order log.
pub mod status_bits {
    pub const QUOTE: u32 = 0x01;
    pub const COUNTER: u32 = 0x02;
    pub const NON_SYSTEM: u32 = 0x04;
    pub const END_OF_TRANSACTION: u32 = 0x1000;
    pub const FILL_OR_KILL: u32 = 0x8_0000;
    pub const RESULT_OF_MOVE: u32 = 0x10_0000;
    pub const RESULT_OF_CANCEL: u32 = 0x20_0000;
    pub const RESULT_OF_GROUP_CANCEL: u32 = 0x40_0000;
    pub const CROSS_TRADE_LEFT_CANCEL: u32 = 0x2000_0000;
}

/// Status bitmask decoded once at the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OrderStatus {
    /// Quote rather than a plain order
    pub quote: bool,
    /// Counter order
    pub counter: bool,
    /// Not a real resting order; never touches the ladder
    pub non_system: bool,
    /// Last record of its exchange transaction
    pub end_of_transaction: bool,
    /// Fill-or-kill order
    pub fill_or_kill: bool,
    /// Record produced by an order move
    pub result_of_move: bool,
    /// Record produced by a single cancel
    pub result_of_cancel: bool,
    /// Record produced by a group cancel
    pub result_of_group_cancel: bool,
    /// Remainder cancelled after a cross trade
    pub cross_trade_left_cancel: bool,
}

impl OrderStatus {
    /// Decode a raw status field. Unknown bits are ignored.
    pub const fn from_bits(bits: u32) -> Self {
        use status_bits::*;
        Self {
            quote: bits & QUOTE != 0,
            counter: bits & COUNTER != 0,
            non_system: bits & NON_SYSTEM != 0,
            end_of_transaction: bits & END_OF_TRANSACTION != 0,
            fill_or_kill: bits & FILL_OR_KILL != 0,
            result_of_move: bits & RESULT_OF_MOVE != 0,
            result_of_cancel: bits & RESULT_OF_CANCEL != 0,
            result_of_group_cancel: bits & RESULT_OF_GROUP_CANCEL != 0,
            cross_trade_left_cancel: bits & CROSS_TRADE_LEFT_CANCEL != 0,
        }
    }

    /// Re-encode into the raw bitmask.
    pub const fn bits(&self) -> u32 {
        use status_bits::*;
        let mut bits = 0;
        if self.quote {
            bits |= QUOTE;
        }
        if self.counter {
            bits |= COUNTER;
        }
        if self.non_system {
            bits |= NON_SYSTEM;
        }
        if self.end_of_transaction {
            bits |= END_OF_TRANSACTION;
        }
        if self.fill_or_kill {
            bits |= FILL_OR_KILL;
        }
        if self.result_of_move {
            bits |= RESULT_OF_MOVE;
        }
        if self.result_of_cancel {
            bits |= RESULT_OF_CANCEL;
        }
        if self.result_of_group_cancel {
            bits |= RESULT_OF_GROUP_CANCEL;
        }
        if self.cross_trade_left_cancel {
            bits |= CROSS_TRADE_LEFT_CANCEL;
        }
        bits
    }

    /// Status with only the end-of-transaction marker set
    pub const fn end_of_transaction() -> Self {
        Self::from_bits(status_bits::END_OF_TRANSACTION)
    }

    /// Status with only the non-system marker set
    pub const fn non_system() -> Self {
        Self::from_bits(status_bits::NON_SYSTEM)
    }
}

// ============================================================================
// Input Events
// ============================================================================

/// One order-log record
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogRecord {
    /// Instrument the order rests on
    pub instrument: InstrumentId,
    pub side: Side,
    pub action: Action,
    pub status: OrderStatus,
    /// Fixed-point price field
    pub price: Bcd,
    /// Amount added or removed by this record
    pub amount: u64,
    /// Order amount left after this record, when the feed supplies it
    pub amount_rest: Option<u64>,
}

impl LogRecord {
    /// Plain record with an empty status and no remainder.
    pub fn new(instrument: InstrumentId, side: Side, action: Action, price: Bcd, amount: u64) -> Self {
        Self {
            instrument,
            side,
            action,
            status: OrderStatus::default(),
            price,
            amount,
            amount_rest: None,
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_amount_rest(mut self, amount_rest: u64) -> Self {
        self.amount_rest = Some(amount_rest);
        self
    }

    /// Map the feed's `-1` remainder sentinel onto `Option`.
    #[inline]
    pub fn amount_rest_from_raw(raw: i64) -> Option<u64> {
        u64::try_from(raw).ok()
    }
}

/// Input events from the transport
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FeedEvent {
    /// A single order-log record
    Log(LogRecord),
    /// Transaction commit boundary
    Commit,
}

// ============================================================================
// Output Events
// ============================================================================

/// Best bid/ask of one instrument at a commit boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Snapshot {
    pub instrument: InstrumentId,
    /// Highest bid, `Price::ZERO` when no bids rest
    pub best_bid: Price,
    /// Lowest ask, `Price::ZERO` when no asks rest
    pub best_ask: Price,
}
