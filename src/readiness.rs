//! Readiness - per-instrument gate on trusting the order log.
//!
//! The replicated log can start mid-transaction, so deltas for orders
//! that predate the attach point may be partial. A book only starts
//! accepting deltas after it has seen one end-of-transaction marker
//! followed by a commit.
//!
//! ```text
//! NotReady --(end-of-transaction record)--> AlmostReady --(commit)--> Ready
//! ```

/// Transactional readiness of one instrument's book.
///
/// Ordered so that `NotReady < AlmostReady < Ready`; transitions only
/// ever move up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Readiness {
    /// Waiting for an end-of-transaction marker
    #[default]
    NotReady,
    /// Marker seen; waiting for the commit that closes it
    AlmostReady,
    /// Deltas are applied to the ladder
    Ready,
}

impl Readiness {
    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }

    /// A gated record arrived. Only its end-of-transaction flag matters.
    ///
    /// # Returns
    /// `true` if the state changed.
    #[inline]
    pub fn on_record(&mut self, end_of_transaction: bool) -> bool {
        if end_of_transaction && *self == Readiness::NotReady {
            *self = Readiness::AlmostReady;
            true
        } else {
            false
        }
    }

    /// A commit boundary passed.
    ///
    /// # Returns
    /// `true` if the state changed.
    #[inline]
    pub fn on_commit(&mut self) -> bool {
        if *self == Readiness::AlmostReady {
            *self = Readiness::Ready;
            true
        } else {
            false
        }
    }
}
