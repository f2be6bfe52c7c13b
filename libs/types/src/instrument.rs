//! Instruments and the read-only instrument catalog
//!
//! Symbols are compared case-insensitively; the canonical form is upper
//! case. The catalog is built once from the store at startup and never
//! mutated afterwards, so it is shared behind an `Arc` without locking.

use crate::errors::{SymbolError, MAX_SYMBOL_LEN};
use crate::ids::InstrumentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Canonical (trimmed, upper-case) instrument symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize and validate a symbol.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(SymbolError::Empty);
        }
        if normalized.chars().count() > MAX_SYMBOL_LEN {
            return Err(SymbolError::TooLong {
                symbol: normalized,
                max: MAX_SYMBOL_LEN,
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: Symbol,
}

impl Instrument {
    pub fn new(id: InstrumentId, symbol: Symbol) -> Self {
        Self { id, symbol }
    }
}

/// In-memory id <-> symbol map.
///
/// Iteration is ordered by id.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    by_symbol: HashMap<Symbol, InstrumentId>,
    by_id: BTreeMap<InstrumentId, Symbol>,
}

impl InstrumentCatalog {
    /// Build the catalog from store rows.
    pub fn from_instruments(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut catalog = Self::default();
        for instrument in instruments {
            catalog.by_symbol.insert(instrument.symbol.clone(), instrument.id);
            catalog.by_id.insert(instrument.id, instrument.symbol);
        }
        catalog
    }

    /// Case-insensitive symbol lookup.
    pub fn id_of(&self, symbol: &str) -> Option<InstrumentId> {
        let symbol = Symbol::parse(symbol).ok()?;
        self.by_symbol.get(&symbol).copied()
    }

    pub fn symbol_of(&self, id: InstrumentId) -> Option<&Symbol> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: InstrumentId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// All instruments in id order.
    pub fn iter(&self) -> impl Iterator<Item = (InstrumentId, &Symbol)> {
        self.by_id.iter().map(|(id, symbol)| (*id, symbol))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
