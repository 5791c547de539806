//! Error types for order-log reconstruction.
//!
//! Every error here is local to one record or one instrument; none of them
//! stops the rest of the instrument universe from being processed.

use thiserror::Error;

use crate::command::{InstrumentId, Side};
use crate::decimal::Price;

/// Result type alias for reconstruction operations.
pub type Result<T> = std::result::Result<T, ReconstructError>;

/// Failure to turn a fixed-point field into a price.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Scale does not index the power-of-ten table
    #[error("decimal scale {0} is outside the supported range 0..=7")]
    ScaleOutOfRange(u8),

    /// Mantissa does not fit the 64-bit fixed-point field
    #[error("decimal mantissa does not fit in 64 bits")]
    MantissaOverflow,
}

/// A ladder mutation that would break the positive-volume invariant.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LadderError {
    #[error("{side:?} level {price} would go negative ({current} {delta:+})")]
    NegativeVolume {
        side: Side,
        price: Price,
        current: u64,
        delta: i128,
    },

    #[error("{side:?} level {price} would exceed u64::MAX ({current} {delta:+})")]
    VolumeOverflow {
        side: Side,
        price: Price,
        current: u64,
        delta: i128,
    },

    #[error("{side:?} level {price} holds non-positive volume {volume}")]
    NonPositiveLevel { side: Side, price: Price, volume: u64 },
}

/// The log stream and the reconstructed state have diverged for one instrument.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConsistencyViolation {
    /// Delete carried a zero amount
    #[error("instrument {instrument}: deletion of an empty order at {price}")]
    EmptyDelete { instrument: InstrumentId, price: Price },

    /// Delete left a non-zero remainder on the order
    #[error("instrument {instrument}: deletion at {price} left remainder {remaining:?}")]
    DeleteWithRemainder {
        instrument: InstrumentId,
        price: Price,
        remaining: Option<u64>,
    },

    /// A delta could not be applied to the ladder
    #[error("instrument {instrument}: {source}")]
    Ladder {
        instrument: InstrumentId,
        source: LadderError,
    },
}

impl ConsistencyViolation {
    /// Instrument whose book diverged.
    pub fn instrument(&self) -> InstrumentId {
        match self {
            ConsistencyViolation::EmptyDelete { instrument, .. }
            | ConsistencyViolation::DeleteWithRemainder { instrument, .. }
            | ConsistencyViolation::Ladder { instrument, .. } => *instrument,
        }
    }
}

/// Umbrella error returned by the dispatcher.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ReconstructError {
    #[error("instrument {instrument}: {source}")]
    Decode {
        instrument: InstrumentId,
        source: DecodeError,
    },

    #[error(transparent)]
    Consistency(#[from] ConsistencyViolation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::ScaleOutOfRange(9);
        assert_eq!(
            err.to_string(),
            "decimal scale 9 is outside the supported range 0..=7"
        );
    }

    #[test]
    fn test_violation_instrument() {
        let err = ConsistencyViolation::EmptyDelete {
            instrument: 42,
            price: Price::new(10.5),
        };
        assert_eq!(err.instrument(), 42);
        let wrapped: ReconstructError = err.into();
        assert!(matches!(wrapped, ReconstructError::Consistency(_)));
    }
}
