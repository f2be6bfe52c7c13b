//! In-process sample store
//!
//! Same semantics as the PostgreSQL store: ids assigned in insertion order,
//! one timestamp per batch, timestamps never go backwards. Used by the test
//! suites; `fail_inserts` lets a test simulate a storage outage.

use super::{window_start, TimeSeriesStore};
use crate::error::RelayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use types::ids::{InstrumentId, SampleId};
use types::instrument::{Instrument, Symbol};
use types::sample::{Quote, Sample};

#[derive(Debug, Default)]
struct Tables {
    instruments: Vec<Instrument>,
    samples: Vec<Sample>,
    last_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `insert_samples` calls fail (or succeed again).
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Append a batch with an explicit timestamp.
    ///
    /// Lets tests place rows outside the lookback window. The timestamp is
    /// clamped so the log stays non-decreasing.
    pub async fn insert_at(
        &self,
        batch: &[Quote],
        timestamp: DateTime<Utc>,
    ) -> Result<u64, RelayError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RelayError::Persistence(
                "sample log unavailable".to_string(),
            ));
        }

        let mut tables = self.tables.lock().await;
        for quote in batch {
            if !tables
                .instruments
                .iter()
                .any(|i| i.id == quote.instrument_id)
            {
                return Err(RelayError::Persistence(format!(
                    "instrument {} does not exist",
                    quote.instrument_id
                )));
            }
        }

        let timestamp = match tables.last_timestamp {
            Some(last) if last > timestamp => last,
            _ => timestamp,
        };
        for quote in batch {
            let id = SampleId::new(tables.samples.len() as i64 + 1);
            tables.samples.push(Sample {
                id,
                instrument_id: quote.instrument_id,
                value: quote.value,
                timestamp,
            });
        }
        if !batch.is_empty() {
            tables.last_timestamp = Some(timestamp);
        }
        Ok(batch.len() as u64)
    }

    /// Every stored sample, in insertion order.
    pub async fn samples(&self) -> Vec<Sample> {
        self.tables.lock().await.samples.clone()
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn ensure_instrument(&self, symbol: &Symbol) -> Result<(), RelayError> {
        let mut tables = self.tables.lock().await;
        if tables.instruments.iter().any(|i| &i.symbol == symbol) {
            return Ok(());
        }
        let id = InstrumentId::new(tables.instruments.len() as i32 + 1);
        tables.instruments.push(Instrument::new(id, symbol.clone()));
        Ok(())
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, RelayError> {
        let mut instruments = self.tables.lock().await.instruments.clone();
        instruments.sort_by_key(|i| i.id);
        Ok(instruments)
    }

    async fn insert_samples(&self, batch: &[Quote]) -> Result<u64, RelayError> {
        self.insert_at(batch, Utc::now()).await
    }

    async fn recent_samples(
        &self,
        instrument: InstrumentId,
        lookback: Duration,
    ) -> Result<Vec<Sample>, RelayError> {
        let since = window_start(Utc::now(), lookback);
        let tables = self.tables.lock().await;
        let mut samples: Vec<Sample> = tables
            .samples
            .iter()
            .filter(|s| s.instrument_id == instrument && s.timestamp >= since)
            .cloned()
            .collect();
        samples.sort_by_key(|s| (s.timestamp, s.id));
        Ok(samples)
    }
}
