//! Replay source - order-log and reference-data files in CSV form.
//!
//! Stands in for the live replication listeners: one file per stream,
//! read eagerly into typed events. Raw feed conventions (status bitmask,
//! `-1` remainder, direction codes) are decoded here and nowhere else.

use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::command::{Action, FeedEvent, InstrumentId, LogRecord, OrderStatus, Side};
use crate::decimal::Bcd;
use crate::error::DecodeError;
use crate::metadata::{ContractKind, InstrumentInfo, MetadataEvent};

/// Failure to read a replay file.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: missing `{field}`")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: unknown action code {action}")]
    UnknownAction { row: usize, action: u8 },

    #[error("row {row}: bad price {text:?}: {source}")]
    Price {
        row: usize,
        text: String,
        source: rust_decimal::Error,
    },

    #[error("row {row}: {source}")]
    Decode { row: usize, source: DecodeError },
}

impl ReplayError {
    /// Price failures reject one record; everything else makes the file unreadable.
    pub fn is_record_local(&self) -> bool {
        matches!(self, ReplayError::Price { .. } | ReplayError::Decode { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RowKind {
    Log,
    Commit,
}

/// One line of an order-log file, as written
#[derive(Debug, Deserialize)]
struct OrderLogRow {
    kind: RowKind,
    isin_id: Option<InstrumentId>,
    dir: Option<i8>,
    action: Option<u8>,
    status: Option<u32>,
    price: Option<String>,
    amount: Option<u64>,
    amount_rest: Option<i64>,
    moment: Option<DateTime<Utc>>,
}

/// A feed event with the exchange timestamp it carried, if any
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplayEvent {
    pub moment: Option<DateTime<Utc>>,
    pub event: FeedEvent,
}

/// A parsed order-log file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayFeed {
    pub events: Vec<ReplayEvent>,
    /// Rows dropped because their price could not be decoded
    pub rejected: usize,
}

fn required<T>(value: Option<T>, row: usize, field: &'static str) -> Result<T, ReplayError> {
    value.ok_or(ReplayError::MissingField { row, field })
}

impl OrderLogRow {
    fn into_event(self, row: usize) -> Result<ReplayEvent, ReplayError> {
        let event = match self.kind {
            RowKind::Commit => FeedEvent::Commit,
            RowKind::Log => {
                let raw_action = required(self.action, row, "action")?;
                let action = Action::from_raw(raw_action)
                    .ok_or(ReplayError::UnknownAction { row, action: raw_action })?;

                let text = required(self.price, row, "price")?;
                let value = Decimal::from_str(text.trim())
                    .map_err(|source| ReplayError::Price { row, text: text.clone(), source })?;
                let price = Bcd::from_decimal(value).map_err(|source| ReplayError::Decode { row, source })?;

                FeedEvent::Log(LogRecord {
                    instrument: required(self.isin_id, row, "isin_id")?,
                    side: Side::from_dir(required(self.dir, row, "dir")?),
                    action,
                    status: OrderStatus::from_bits(self.status.unwrap_or(0)),
                    price,
                    amount: required(self.amount, row, "amount")?,
                    amount_rest: self.amount_rest.and_then(LogRecord::amount_rest_from_raw),
                })
            }
        };

        Ok(ReplayEvent {
            moment: self.moment,
            event,
        })
    }
}

/// Read an order-log CSV.
///
/// Columns: `kind,isin_id,dir,action,status,price,amount,amount_rest,moment`.
/// Commit rows leave every column but `kind` (and optionally `moment`) empty.
///
/// A row whose price cannot be decoded is logged, counted in
/// `ReplayFeed::rejected` and skipped. Malformed CSV or missing columns fail
/// the whole read.
pub fn read_feed<R: io::Read>(reader: R) -> Result<ReplayFeed, ReplayError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut feed = ReplayFeed::default();

    for (index, row) in csv.deserialize::<OrderLogRow>().enumerate() {
        // Row numbers count the header as row 1
        match row?.into_event(index + 2) {
            Ok(event) => feed.events.push(event),
            Err(e) if e.is_record_local() => {
                warn!("Skipping order-log {}", e);
                feed.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(feed)
}

/// Read a reference-data CSV.
///
/// Columns: `isin_id,name,short_isin,lot_volume`; the last two may be empty.
pub fn read_instruments<R: io::Read>(reader: R, kind: ContractKind) -> Result<Vec<MetadataEvent>, ReplayError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut events = Vec::new();

    for row in csv.deserialize::<InstrumentInfo>() {
        events.push(MetadataEvent { kind, info: row? });
    }

    Ok(events)
}

pub fn open_feed(path: impl AsRef<Path>) -> Result<ReplayFeed, ReplayError> {
    read_feed(File::open(path)?)
}

pub fn open_instruments(path: impl AsRef<Path>, kind: ContractKind) -> Result<Vec<MetadataEvent>, ReplayError> {
    read_instruments(File::open(path)?, kind)
}
