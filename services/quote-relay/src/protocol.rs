//! WebSocket wire contract
//!
//! Client commands:
//! - `{"action": "assets"}`
//! - `{"action": "subscribe", "message": {"assetId": <integer>}}`
//!
//! Server frames:
//! - replies carry a top-level `action` plus a `message` object,
//! - ticker pushes carry only `message`,
//! - errors are bare text frames holding the `CommandError` text.

use crate::error::CommandError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::ids::InstrumentId;
use types::instrument::InstrumentCatalog;
use types::numeric::round_display;
use types::sample::Sample;

/// A validated client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Assets,
    Subscribe(InstrumentId),
}

/// One catalog entry in the `assets` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: InstrumentId,
    pub name: String,
}

/// One price observation as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub asset_name: String,
    /// Unix seconds
    pub time: i64,
    pub asset_id: InstrumentId,
    /// Already rounded to display precision
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

impl PricePoint {
    pub fn new(asset_name: &str, time: i64, asset_id: InstrumentId, value: Decimal, decimals: u32) -> Self {
        Self {
            asset_name: asset_name.to_string(),
            time,
            asset_id,
            value: round_display(value, decimals),
        }
    }

    pub fn from_sample(asset_name: &str, sample: &Sample, decimals: u32) -> Self {
        Self::new(
            asset_name,
            sample.unix_time(),
            sample.instrument_id,
            sample.value,
            decimals,
        )
    }
}

/// Replies to client commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "message", rename_all = "snake_case")]
pub enum ServerMessage {
    Assets { assets: Vec<AssetEntry> },
    AssetHistory { points: Vec<PricePoint> },
}

impl ServerMessage {
    /// The full catalog, in id order.
    pub fn assets(catalog: &InstrumentCatalog) -> Self {
        ServerMessage::Assets {
            assets: catalog
                .iter()
                .map(|(id, symbol)| AssetEntry {
                    id,
                    name: symbol.to_string(),
                })
                .collect(),
        }
    }
}

/// Ticker update pushed by the dispatcher. Has no `action` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPush {
    pub message: PricePoint,
}

/// Parse and validate one inbound text frame.
///
/// Subscribe validation runs in a fixed order and reports the first
/// failure; the instrument must be present in `catalog`.
pub fn parse_command(text: &str, catalog: &InstrumentCatalog) -> Result<Command, CommandError> {
    let frame: Value = serde_json::from_str(text).map_err(|_| CommandError::InvalidJson)?;

    // A non-object document has no `action` field either
    let action = frame.get("action").ok_or(CommandError::ActionNotFound)?;

    match action.as_str() {
        Some("assets") => Ok(Command::Assets),
        Some("subscribe") => {
            let message = frame.get("message").ok_or(CommandError::MessageNotFound)?;
            let message = message.as_object().ok_or(CommandError::InvalidMessage)?;
            let asset_id = message.get("assetId").ok_or(CommandError::AssetIdNotFound)?;
            let Value::Number(number) = asset_id else {
                return Err(CommandError::AssetIdNotInteger);
            };
            let Some(asset_id) = number.as_i64() else {
                // An integer literal of any magnitude is still an integer
                return Err(if is_integer_literal(number) {
                    CommandError::UnknownAsset
                } else {
                    CommandError::AssetIdNotInteger
                });
            };
            InstrumentId::from_wire(asset_id)
                .filter(|id| catalog.contains(*id))
                .map(Command::Subscribe)
                .ok_or(CommandError::UnknownAsset)
        }
        _ => Err(CommandError::ActionNotSupported),
    }
}

/// Numbers keep their source text, so an integer is a literal with no
/// fraction or exponent.
fn is_integer_literal(number: &serde_json::Number) -> bool {
    !number.to_string().contains(['.', 'e', 'E'])
}
