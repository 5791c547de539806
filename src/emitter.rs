//! Snapshot Emitter - hands commit-time snapshots to presentation.
//!
//! Names come from the metadata directory at emission time. A snapshot
//! for an instrument neither reference feed has named yet goes out with
//! `name: None`.

use crate::command::{InstrumentId, Snapshot};
use crate::decimal::Price;
use crate::metadata::InstrumentDirectory;

/// A snapshot with its display name borrowed from the directory
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NamedSnapshot<'a> {
    pub snapshot: Snapshot,
    pub name: Option<&'a str>,
}

impl NamedSnapshot<'_> {
    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.snapshot.instrument
    }

    #[inline]
    pub fn best_bid(&self) -> Price {
        self.snapshot.best_bid
    }

    #[inline]
    pub fn best_ask(&self) -> Price {
        self.snapshot.best_ask
    }

    pub fn to_owned_snapshot(&self) -> OwnedSnapshot {
        OwnedSnapshot {
            snapshot: self.snapshot,
            name: self.name.map(str::to_owned),
        }
    }
}

/// A snapshot that can cross a thread boundary
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedSnapshot {
    pub snapshot: Snapshot,
    pub name: Option<String>,
}

/// Presentation boundary.
pub trait SnapshotSink {
    fn emit(&mut self, snapshot: &NamedSnapshot<'_>);
}

impl<F> SnapshotSink for F
where
    F: FnMut(&NamedSnapshot<'_>),
{
    #[inline]
    fn emit(&mut self, snapshot: &NamedSnapshot<'_>) {
        self(snapshot)
    }
}

/// Sink that keeps every snapshot it receives.
#[derive(Clone, Debug, Default)]
pub struct SnapshotLog {
    pub snapshots: Vec<OwnedSnapshot>,
}

impl SnapshotLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Most recent snapshot of one instrument
    pub fn latest(&self, instrument: InstrumentId) -> Option<&OwnedSnapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.snapshot.instrument == instrument)
    }
}

impl SnapshotSink for SnapshotLog {
    fn emit(&mut self, snapshot: &NamedSnapshot<'_>) {
        self.snapshots.push(snapshot.to_owned_snapshot());
    }
}

/// Resolve names for a commit's snapshots and pass them to the sink, in
/// the order the commit produced them.
///
/// # Returns
/// Number of snapshots emitted.
pub fn emit_snapshots<S: SnapshotSink + ?Sized>(
    snapshots: &[Snapshot],
    directory: &InstrumentDirectory,
    sink: &mut S,
) -> usize {
    for snapshot in snapshots {
        sink.emit(&NamedSnapshot {
            snapshot: *snapshot,
            name: directory.display_name(snapshot.instrument),
        });
    }
    snapshots.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ContractKind, InstrumentInfo};

    fn snap(instrument: InstrumentId, bid: f64, ask: f64) -> Snapshot {
        Snapshot {
            instrument,
            best_bid: Price::new(bid),
            best_ask: Price::new(ask),
        }
    }

    #[test]
    fn test_names_resolved_at_emission() {
        let mut dir = InstrumentDirectory::new();
        dir.upsert(ContractKind::Future, InstrumentInfo::new(1, "Si-12.26"));

        let mut log = SnapshotLog::new();
        let n = emit_snapshots(&[snap(1, 99.0, 101.0), snap(2, 5.0, 0.0)], &dir, &mut log);

        assert_eq!(n, 2);
        assert_eq!(log.snapshots[0].name.as_deref(), Some("Si-12.26"));
        assert_eq!(log.snapshots[1].name, None);
        assert_eq!(log.latest(2).unwrap().snapshot.best_bid, Price::new(5.0));
    }

    #[test]
    fn test_closure_sink() {
        let dir = InstrumentDirectory::new();
        let mut seen = Vec::new();
        let mut sink = |s: &NamedSnapshot<'_>| seen.push(s.instrument());

        emit_snapshots(&[snap(4, 1.0, 2.0), snap(8, 1.0, 2.0)], &dir, &mut sink);
        assert_eq!(seen, vec![4, 8]);
    }
}
