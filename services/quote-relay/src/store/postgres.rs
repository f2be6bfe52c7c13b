//! PostgreSQL sample store
//!
//! Timestamps come from the database clock (`DEFAULT now()`), so every row
//! of one batch carries its transaction's start time.

use super::{window_start, TimeSeriesStore};
use crate::config::PostgresConfig;
use crate::error::RelayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::{debug, info};
use types::ids::{InstrumentId, SampleId};
use types::instrument::{Instrument, Symbol};
use types::sample::{Quote, Sample};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the shared connection pool.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, RelayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .max_lifetime(config.max_lifetime())
            .connect(&config.connect_url())
            .await?;
        info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Database connections ready"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[async_trait]
impl TimeSeriesStore for PgStore {
    async fn ensure_instrument(&self, symbol: &Symbol) -> Result<(), RelayError> {
        sqlx::query(
            r"
            INSERT INTO instruments (symbol) VALUES ($1)
            ON CONFLICT (symbol) DO NOTHING
            ",
        )
        .bind(symbol.as_str())
        .execute(&self.pool)
        .await?;

        debug!(symbol = %symbol, "Instrument ensured");
        Ok(())
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, RelayError> {
        let rows = sqlx::query("SELECT id, symbol FROM instruments ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut instruments = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i32 = row.try_get("id")?;
            let symbol: String = row.try_get("symbol")?;
            instruments.push(Instrument::new(InstrumentId::new(id), Symbol::parse(&symbol)?));
        }
        Ok(instruments)
    }

    async fn insert_samples(&self, batch: &[Quote]) -> Result<u64, RelayError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO samples (instrument_id, value) ");
        builder.push_values(batch, |mut row, quote| {
            row.push_bind(quote.instrument_id.get()).push_bind(quote.value);
        });
        let result = builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(rows = result.rows_affected(), "Samples persisted");
        Ok(result.rows_affected())
    }

    async fn recent_samples(
        &self,
        instrument: InstrumentId,
        lookback: Duration,
    ) -> Result<Vec<Sample>, RelayError> {
        let since = window_start(Utc::now(), lookback);
        let rows = sqlx::query(
            r"
            SELECT id, instrument_id, value, recorded_at
            FROM samples
            WHERE instrument_id = $1 AND recorded_at >= $2
            ORDER BY recorded_at ASC, id ASC
            ",
        )
        .bind(instrument.get())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<Sample, RelayError> {
                let id: i64 = row.try_get("id")?;
                let instrument_id: i32 = row.try_get("instrument_id")?;
                let value: Decimal = row.try_get("value")?;
                let timestamp: DateTime<Utc> = row.try_get("recorded_at")?;
                Ok(Sample {
                    id: SampleId::new(id),
                    instrument_id: InstrumentId::new(instrument_id),
                    value,
                    timestamp,
                })
            })
            .collect()
    }
}
