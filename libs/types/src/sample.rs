//! Quotes and persisted samples
//!
//! A `Quote` is what one ingestion cycle produces for an instrument; once it
//! is written to the sample log it becomes a `Sample` carrying the id and
//! timestamp assigned at insertion.

use crate::ids::{InstrumentId, SampleId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mid-price for one instrument in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub instrument_id: InstrumentId,
    /// Full precision; never rounded before storage
    pub value: Decimal,
}

impl Quote {
    pub fn new(instrument_id: InstrumentId, value: Decimal) -> Self {
        Self {
            instrument_id,
            value,
        }
    }
}

/// Row of the append-only sample log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub instrument_id: InstrumentId,
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// Unix seconds, as sent to clients.
    pub fn unix_time(&self) -> i64 {
        self.timestamp.timestamp()
    }
}
