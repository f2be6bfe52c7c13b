use thiserror::Error;
use types::errors::SymbolError;

/// Central error type for the relay.
///
/// Only `Config` and `Catalog` are fatal, and only during startup; every
/// other kind is logged by the component that hit it and the component
/// carries on.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] SymbolError),
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        RelayError::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}

/// Client-visible command failures.
///
/// The `Display` text is exactly what goes over the wire, as a bare text
/// frame rather than a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid JSON in message")]
    InvalidJson,

    #[error("Action not found")]
    ActionNotFound,

    #[error("Action not supported")]
    ActionNotSupported,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Invalid message")]
    InvalidMessage,

    #[error("Asset ID not found in message")]
    AssetIdNotFound,

    #[error("Asset ID must be an integer")]
    AssetIdNotInteger,

    #[error("Asset ID does not exist")]
    UnknownAsset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_wire_text() {
        assert_eq!(CommandError::InvalidJson.to_string(), "Invalid JSON in message");
        assert_eq!(CommandError::UnknownAsset.to_string(), "Asset ID does not exist");
        assert_eq!(
            CommandError::AssetIdNotFound.to_string(),
            "Asset ID not found in message"
        );
    }

    #[test]
    fn test_symbol_error_converts() {
        let err: RelayError = SymbolError::Empty.into();
        assert!(matches!(err, RelayError::Catalog(_)));
    }
}
