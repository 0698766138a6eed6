//! Market data module.
//!
//! Typed snapshots, the data-source contract the engine consumes, an
//! in-memory source, and windowed per-day retrieval.
//!
//! # Missing Data
//! Sources may return partial data. Anything that cannot be retrieved is
//! recorded as missing and omitted downstream; it is never replaced by zero.

mod memory;
mod source;
mod types;
mod window;

pub use memory::{InMemorySource, InMemorySourceBuilder, MarketFixture};
pub use source::{MarketDataSource, SourceError};
pub use types::{DailySnapshots, EntityKind, EntitySnapshot, PricePoint, SnapshotRecord, TradingDay};
pub use window::{LimitUpWindow, SnapshotWindow};
