//! Upstream payload normalization
//!
//! The feed wraps its JSON in a JSONP-style decoration. The decoration
//! tokens are stripped, the `Rates` records decoded, and each record for a
//! known instrument turned into a mid-price `Quote`. Prices are read from
//! their literal text so no binary float ever touches them.

use crate::error::RelayError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::warn;
use types::instrument::InstrumentCatalog;
use types::numeric::mid_price;
use types::sample::Quote;

/// Tokens removed from the raw body before decoding.
const DECORATION_TOKENS: [&str; 4] = ["null", "(", ")", ";"];

#[derive(Debug, Deserialize)]
struct RatesPayload {
    #[serde(rename = "Rates")]
    rates: Vec<RawRate>,
}

#[derive(Debug, Deserialize)]
struct RawRate {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Bid")]
    bid: serde_json::Number,
    #[serde(rename = "Ask")]
    ask: serde_json::Number,
}

/// Remove the decoration tokens.
pub fn strip_decoration(raw: &str) -> String {
    DECORATION_TOKENS
        .iter()
        .fold(raw.to_string(), |body, token| body.replace(token, ""))
}

/// Exact when the literal fits; digits beyond the decimal's precision are
/// rounded off. Magnitudes outside the decimal range are an error.
fn to_decimal(number: &serde_json::Number) -> Result<Decimal, RelayError> {
    let text = number.to_string();
    Decimal::from_str_exact(&text)
        .or_else(|_| Decimal::from_str(&text))
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| RelayError::Parse(format!("price {} is not a decimal: {}", text, e)))
}

/// Decode one upstream body into this cycle's quotes.
///
/// Records for symbols outside the catalog are skipped. A known record
/// whose prices cannot be represented is dropped with a warning; only a
/// body that does not decode at all rejects the payload.
pub fn normalize(raw: &str, catalog: &InstrumentCatalog) -> Result<Vec<Quote>, RelayError> {
    let cleaned = strip_decoration(raw);
    let payload: RatesPayload = serde_json::from_str(&cleaned)
        .map_err(|e| RelayError::Parse(format!("Invalid quote payload: {}", e)))?;

    let mut quotes = Vec::with_capacity(payload.rates.len());
    for rate in payload.rates {
        let Some(instrument_id) = catalog.id_of(&rate.symbol) else {
            continue;
        };
        let (bid, ask) = match (to_decimal(&rate.bid), to_decimal(&rate.ask)) {
            (Ok(bid), Ok(ask)) => (bid, ask),
            (Err(e), _) | (_, Err(e)) => {
                warn!(symbol = %rate.symbol, error = %e, "Unrepresentable price, record dropped");
                continue;
            }
        };
        match mid_price(bid, ask) {
            Some(value) => quotes.push(Quote::new(instrument_id, value)),
            None => warn!(
                symbol = %rate.symbol,
                %bid,
                %ask,
                "Mid-price out of decimal range, record dropped"
            ),
        }
    }
    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::rates_body;
    use types::ids::InstrumentId;
    use types::instrument::{Instrument, Symbol};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn catalog() -> InstrumentCatalog {
        InstrumentCatalog::from_instruments([
            Instrument::new(InstrumentId::new(1), Symbol::parse("EURUSD").unwrap()),
            Instrument::new(InstrumentId::new(2), Symbol::parse("GBPUSD").unwrap()),
        ])
    }

    #[test]
    fn test_strip_decoration() {
        assert_eq!(strip_decoration("null({\"a\":1});"), "{\"a\":1}");
    }

    #[test]
    fn test_mid_price_per_known_symbol() {
        let body = rates_body(&[("EURUSD", "1.1000", "1.1002"), ("GBPUSD", "1.2700", "1.2704")]);
        let quotes = normalize(&body, &catalog()).unwrap();

        assert_eq!(
            quotes,
            vec![
                Quote::new(InstrumentId::new(1), d("1.1001")),
                Quote::new(InstrumentId::new(2), d("1.2702")),
            ]
        );
    }

    #[test]
    fn test_unknown_symbol_dropped_without_affecting_others() {
        let body = rates_body(&[
            ("USDJPY", "151.10", "151.12"),
            ("eurusd", "1.1000", "1.1002"),
        ]);
        let quotes = normalize(&body, &catalog()).unwrap();

        assert_eq!(quotes, vec![Quote::new(InstrumentId::new(1), d("1.1001"))]);
    }

    #[test]
    fn test_no_float_rounding() {
        let body = rates_body(&[("EURUSD", "0.1", "0.2"), ("GBPUSD", "1.123456789012345678", "1.123456789012345679")]);
        let quotes = normalize(&body, &catalog()).unwrap();

        assert_eq!(quotes[0].value, d("0.15"));
        assert_eq!(quotes[1].value, d("1.1234567890123456785"));
    }

    #[test]
    fn test_excess_precision_is_rounded_not_fatal() {
        let body = rates_body(&[
            ("EURUSD", "1.1000", "1.1002"),
            ("GBPUSD", "1.123456789012345678901234567891", "1.123456789012345678901234567891"),
        ]);
        let quotes = normalize(&body, &catalog()).unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0], Quote::new(InstrumentId::new(1), d("1.1001")));
        assert_eq!(quotes[1].instrument_id, InstrumentId::new(2));
        assert_eq!(quotes[1].value.round_dp(20), d("1.12345678901234567890"));
    }

    #[test]
    fn test_out_of_range_record_dropped_without_affecting_others() {
        let body = rates_body(&[("GBPUSD", "1e40", "1e40"), ("EURUSD", "1.1000", "1.1002")]);
        let quotes = normalize(&body, &catalog()).unwrap();

        assert_eq!(quotes, vec![Quote::new(InstrumentId::new(1), d("1.1001"))]);
    }

    #[test]
    fn test_integer_prices() {
        let body = rates_body(&[("EURUSD", "1", "2")]);
        let quotes = normalize(&body, &catalog()).unwrap();
        assert_eq!(quotes[0].value, d("1.5"));
    }

    #[test]
    fn test_undecodable_payload_is_parse_error() {
        let result = normalize("<html>maintenance</html>", &catalog());
        assert!(matches!(result, Err(RelayError::Parse(_))));

        let result = normalize("null({\"Quotes\":[]});", &catalog());
        assert!(matches!(result, Err(RelayError::Parse(_))));
    }

    #[test]
    fn test_empty_rates() {
        let quotes = normalize("null({\"Rates\":[]});", &catalog()).unwrap();
        assert!(quotes.is_empty());
    }
}
