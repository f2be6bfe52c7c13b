//! Idempotent schema bootstrap
//!
//! Every statement can be re-run against an existing database: tables,
//! columns and indexes are only created when missing. Runs before the
//! catalog is seeded.

use crate::error::RelayError;
use sqlx::PgPool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS instruments (
        id SERIAL PRIMARY KEY,
        symbol VARCHAR(32) NOT NULL UNIQUE
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS samples (
        id BIGSERIAL PRIMARY KEY,
        instrument_id INTEGER NOT NULL REFERENCES instruments (id) ON DELETE CASCADE,
        value NUMERIC NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    // Older deployments may predate some columns
    "ALTER TABLE instruments ADD COLUMN IF NOT EXISTS symbol VARCHAR(32)",
    "ALTER TABLE samples ADD COLUMN IF NOT EXISTS instrument_id INTEGER REFERENCES instruments (id) ON DELETE CASCADE",
    "ALTER TABLE samples ADD COLUMN IF NOT EXISTS value NUMERIC",
    "ALTER TABLE samples ADD COLUMN IF NOT EXISTS recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()",
    "CREATE UNIQUE INDEX IF NOT EXISTS instruments_symbol_idx ON instruments (symbol)",
    "CREATE INDEX IF NOT EXISTS samples_instrument_id_idx ON samples (instrument_id)",
    "CREATE INDEX IF NOT EXISTS samples_recorded_at_idx ON samples (recorded_at)",
];

/// Create or complete the relay's tables.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RelayError> {
    info!("Checking database structure");
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(statements = STATEMENTS.len(), "Database structure ready");
    Ok(())
}
