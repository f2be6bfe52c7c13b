//! Time-series persistence
//!
//! Owns the instrument catalog and the append-only sample log. The catalog
//! is written only during bootstrap (`ensure_instrument`) and read once to
//! seed the in-memory `InstrumentCatalog`; after that only the sample log
//! changes.

pub mod memory;
pub mod postgres;
pub mod schema;

use crate::error::RelayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use types::ids::InstrumentId;
use types::instrument::{Instrument, Symbol};
use types::sample::{Quote, Sample};

/// Storage contract shared by the ingestion loop and connection handlers.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Insert the symbol unless it already exists.
    async fn ensure_instrument(&self, symbol: &Symbol) -> Result<(), RelayError>;

    /// Every catalog row, ordered by id.
    async fn list_instruments(&self) -> Result<Vec<Instrument>, RelayError>;

    /// Append one cycle's quotes, all or nothing.
    ///
    /// Returns the number of rows written.
    async fn insert_samples(&self, batch: &[Quote]) -> Result<u64, RelayError>;

    /// Samples of one instrument newer than `now - lookback`, oldest first.
    async fn recent_samples(
        &self,
        instrument: InstrumentId,
        lookback: Duration,
    ) -> Result<Vec<Sample>, RelayError>;
}

/// Oldest timestamp inside the lookback window ending at `now`.
///
/// Windows larger than chrono can represent reach back to the minimum
/// timestamp.
pub(crate) fn window_start(now: DateTime<Utc>, lookback: Duration) -> DateTime<Utc> {
    chrono::TimeDelta::from_std(lookback)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
