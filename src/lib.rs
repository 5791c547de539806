//! # ordlog-book
//!
//! Best bid/ask reconstruction from a transactional exchange order log.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: One thread owns every book exclusively (no locks)
//! - **Gated Assembly**: A book ignores deltas until it has seen a full
//!   transaction boundary, so a mid-transaction attach never corrupts it
//! - **Commit Snapshots**: Best prices are only published on commit, for
//!   books that were ready before that commit began
//! - **Local Failure**: A bad price or a diverged book affects one
//!   instrument, never the rest of the universe
//!
//! ## Architecture
//!
//! ```text
//! [Order Log] --> [Reconstructor] --commit--> [Snapshot Emitter] --> [Sink]
//!                   |  per instrument:                 ^
//!                   |  Readiness + PriceLadder         |
//! [Ref Data]  --> [InstrumentDirectory] ---------------+
//! ```

pub mod command;
pub mod config;
pub mod decimal;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod ladder;
pub mod metadata;
pub mod order_book;
pub mod readiness;
pub mod reconstructor;
pub mod replay;

// Re-exports for convenience
pub use command::{Action, FeedEvent, InstrumentId, LogRecord, OrderStatus, Side, Snapshot};
pub use config::EngineConfig;
pub use decimal::{Bcd, Price};
pub use emitter::{NamedSnapshot, OwnedSnapshot, SnapshotLog, SnapshotSink};
pub use engine::{Engine, EngineInput};
pub use error::{ConsistencyViolation, DecodeError, LadderError, ReconstructError};
pub use ladder::{LevelUpdate, PriceLadder};
pub use metadata::{ContractKind, InstrumentDirectory, InstrumentInfo, MetadataEvent};
pub use order_book::OrderBook;
pub use readiness::Readiness;
pub use reconstructor::{RecordOutcome, Reconstructor, ReconstructorStats};
