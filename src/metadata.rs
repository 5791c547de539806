//! Instrument metadata - display names from the two reference feeds.
//!
//! Futures and options arrive on independent streams and may lag the
//! order log, so every lookup is optional.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::command::InstrumentId;

/// Which reference feed an instrument came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Future,
    Option,
}

/// Contract attributes carried by a reference feed row
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InstrumentInfo {
    #[serde(rename = "isin_id")]
    pub instrument: InstrumentId,
    /// Human-readable contract name
    pub name: String,
    /// Exchange ticker code
    #[serde(default)]
    pub short_isin: Option<String>,
    /// Contract size in units of the underlying
    #[serde(default)]
    pub lot_volume: Option<u32>,
}

impl InstrumentInfo {
    pub fn new(instrument: InstrumentId, name: impl Into<String>) -> Self {
        Self {
            instrument,
            name: name.into(),
            short_isin: None,
            lot_volume: None,
        }
    }
}

/// One row from either reference feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataEvent {
    pub kind: ContractKind,
    pub info: InstrumentInfo,
}

/// Futures and options reference data, keyed by instrument id.
#[derive(Debug, Default)]
pub struct InstrumentDirectory {
    futures: FxHashMap<InstrumentId, InstrumentInfo>,
    options: FxHashMap<InstrumentId, InstrumentInfo>,
}

impl InstrumentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(instruments: usize) -> Self {
        Self {
            futures: FxHashMap::with_capacity_and_hasher(instruments, Default::default()),
            options: FxHashMap::with_capacity_and_hasher(instruments, Default::default()),
        }
    }

    /// Insert or replace an entry. Later rows for the same id win.
    pub fn upsert(&mut self, kind: ContractKind, info: InstrumentInfo) {
        let table = match kind {
            ContractKind::Future => &mut self.futures,
            ContractKind::Option => &mut self.options,
        };
        table.insert(info.instrument, info);
    }

    pub fn apply(&mut self, event: MetadataEvent) {
        self.upsert(event.kind, event.info);
    }

    /// Attributes for an instrument, futures first.
    pub fn get(&self, instrument: InstrumentId) -> Option<(ContractKind, &InstrumentInfo)> {
        self.futures
            .get(&instrument)
            .map(|info| (ContractKind::Future, info))
            .or_else(|| {
                self.options
                    .get(&instrument)
                    .map(|info| (ContractKind::Option, info))
            })
    }

    /// Display name, or `None` while neither feed has named the instrument.
    #[inline]
    pub fn display_name(&self, instrument: InstrumentId) -> Option<&str> {
        self.get(instrument).map(|(_, info)| info.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.futures.len() + self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.futures.is_empty() && self.options.is_empty()
    }
}
