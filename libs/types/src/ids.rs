//! Identifier types for catalog and sample-log entities
//!
//! Instrument ids are small positive integers assigned by the store at
//! bootstrap; sample ids are assigned on insertion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an instrument in the catalog
///
/// Serializes as a bare integer, which is how clients refer to instruments
/// on the wire (`assetId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(i32);

impl InstrumentId {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw integer value
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Convert a client-supplied integer.
    ///
    /// Returns `None` for values that can never name an instrument
    /// (non-positive or out of range).
    pub fn from_wire(raw: i64) -> Option<Self> {
        i32::try_from(raw).ok().filter(|v| *v > 0).map(Self)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(i64);

impl SampleId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
