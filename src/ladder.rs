//! Price Ladder - aggregated resting volume per price, per side.
//!
//! Unlike a per-order book, the ladder only knows totals: the order log
//! names a price and an amount, never a queue position. Both sides are
//! sorted maps so best-of-side and every mutation are O(log n).

use std::collections::BTreeMap;

use crate::command::Side;
use crate::decimal::Price;
use crate::error::LadderError;

/// How a log record changes the volume at one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelUpdate {
    /// Signed change to the existing volume; wide enough for any `u64` amount
    Delta(i128),
    /// Authoritative volume for the level
    Absolute(u64),
}

/// Bid and ask ladders of one instrument.
///
/// Invariant: every stored volume is strictly positive. A level that
/// reaches zero is removed in the same call that zeroed it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceLadder {
    /// Bid levels; best bid is the last key
    bids: BTreeMap<Price, u64>,
    /// Ask levels; best ask is the first key
    asks: BTreeMap<Price, u64>,
}

impl PriceLadder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn side(&self, side: Side) -> &BTreeMap<Price, u64> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Price, u64> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Apply one update to a level.
    ///
    /// # Returns
    /// The level's new volume (0 means the level was removed).
    ///
    /// # Errors
    /// `LadderError::NegativeVolume` if a delta would take the level below
    /// zero, `LadderError::VolumeOverflow` if it would exceed `u64::MAX`.
    /// The level is left as it was in both cases.
    pub fn apply(&mut self, side: Side, price: Price, update: LevelUpdate) -> Result<u64, LadderError> {
        let levels = self.side_mut(side);
        let current = levels.get(&price).copied().unwrap_or(0);

        let next = match update {
            LevelUpdate::Absolute(volume) => volume,
            LevelUpdate::Delta(delta) => {
                let next = i128::from(current) + delta;
                if next < 0 {
                    return Err(LadderError::NegativeVolume {
                        side,
                        price,
                        current,
                        delta,
                    });
                }
                u64::try_from(next).map_err(|_| LadderError::VolumeOverflow {
                    side,
                    price,
                    current,
                    delta,
                })?
            }
        };

        if next == 0 {
            levels.remove(&price);
        } else {
            levels.insert(price, next);
        }

        Ok(next)
    }

    /// Remove every level on both sides.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Highest bid, or `Price::ZERO` if there are no bids.
    #[inline]
    pub fn best_bid(&self) -> Price {
        self.bids.keys().next_back().copied().unwrap_or(Price::ZERO)
    }

    /// Lowest ask, or `Price::ZERO` if there are no asks.
    #[inline]
    pub fn best_ask(&self) -> Price {
        self.asks.keys().next().copied().unwrap_or(Price::ZERO)
    }

    /// Best price on a given side
    #[inline]
    pub fn best_price(&self, side: Side) -> Price {
        match side {
            Side::Bid => self.best_bid(),
            Side::Ask => self.best_ask(),
        }
    }

    /// Mid price when both sides rest, otherwise the single populated side.
    ///
    /// A one-sided book reports its best price as "the price"; an empty
    /// book reports 0.
    pub fn mid_or_single_sided_price(&self) -> Price {
        let bid = self.best_bid();
        let ask = self.best_ask();
        match (bid.is_zero(), ask.is_zero()) {
            (true, true) => Price::ZERO,
            (false, false) => Price::new(0.5 * (bid.value() + ask.value())),
            _ => Price::new(bid.value() + ask.value()),
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Volume resting at a level (0 if absent)
    #[inline]
    pub fn volume_at(&self, side: Side, price: Price) -> u64 {
        self.side(side).get(&price).copied().unwrap_or(0)
    }

    /// Levels on one side, best first.
    pub fn levels(&self, side: Side) -> Box<dyn Iterator<Item = (Price, u64)> + '_> {
        match side {
            Side::Bid => Box::new(self.bids.iter().rev().map(|(p, v)| (*p, *v))),
            Side::Ask => Box::new(self.asks.iter().map(|(p, v)| (*p, *v))),
        }
    }

    /// Get the number of bid levels
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Get the number of ask levels
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Check if both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Diagnostic check that no level holds zero volume.
    pub fn verify(&self) -> Result<(), LadderError> {
        for side in [Side::Bid, Side::Ask] {
            if let Some((price, volume)) = self.side(side).iter().find(|(_, v)| **v == 0) {
                return Err(LadderError::NonPositiveLevel {
                    side,
                    price: *price,
                    volume: *volume,
                });
            }
        }
        Ok(())
    }
}
