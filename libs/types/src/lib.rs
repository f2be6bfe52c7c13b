//! Types library for the quote relay
//!
//! This library provides the domain types shared by the relay service:
//! instrument identifiers, the read-only instrument catalog, persisted
//! samples and the decimal helpers used for mid-price and display rounding.
//!
//! # Modules
//! - `ids`: Identifiers (InstrumentId, SampleId)
//! - `numeric`: Mid-price and HALF_UP display rounding
//! - `instrument`: Symbols, instruments and the in-memory catalog
//! - `sample`: Quotes produced per cycle and persisted samples
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod instrument;
pub mod sample;
pub mod errors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::instrument::*;
    pub use crate::sample::*;
    pub use crate::errors::*;
}
