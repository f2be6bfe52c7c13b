//! Error types for the shared domain types

use thiserror::Error;

/// Maximum stored symbol length (matches the catalog column width)
pub const MAX_SYMBOL_LEN: usize = 32;

/// Symbol validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Symbol is empty")]
    Empty,

    #[error("Symbol {symbol} exceeds {max} characters")]
    TooLong { symbol: String, max: usize },
}
