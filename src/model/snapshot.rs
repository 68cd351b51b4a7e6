use serde_json::Value;
use thiserror::Error;

use super::num::{parse_integer, parse_real};
use super::quote::RawQuote;
use super::symbol::Symbol;

const REQUIRED_FIELDS: [&str; 5] = ["symbol", "date", "spot", "strike_step", "option_chain"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unsupported symbol: {0}")]
    UnsupportedSymbol(String),
}

/// One options-chain observation for a symbol on a trade date.
#[derive(Debug, Clone)]
pub struct OptionChainSnapshot {
    /// Opaque trade-date key, passed through to the ledger as-is.
    pub date: String,
    pub symbol: Symbol,
    pub spot: f64,
    pub strike_step: i64,
    pub chain: Vec<RawQuote>,
    /// Whether to rank the new reading against ledger history.
    pub classify: bool,
}

impl OptionChainSnapshot {
    /// Validate a decoded request body.
    pub fn from_request(body: &Value) -> Result<Self, ValidationError> {
        let obj = body.as_object().ok_or(ValidationError::NotAnObject)?;

        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                return Err(ValidationError::MissingField(field));
            }
        }

        let symbol_raw = body["symbol"].as_str().ok_or_else(|| invalid("symbol", "expected a string"))?;
        let symbol: Symbol = symbol_raw
            .parse()
            .map_err(|_| ValidationError::UnsupportedSymbol(symbol_raw.to_string()))?;

        let date = body["date"]
            .as_str()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| invalid("date", "expected a non-empty string"))?
            .to_string();

        let spot = parse_real(&body["spot"])
            .filter(|s| *s > 0.0)
            .ok_or_else(|| invalid("spot", "expected a positive number"))?;

        let strike_step = parse_integer(&body["strike_step"])
            .filter(|s| *s > 0)
            .ok_or_else(|| invalid("strike_step", "expected a positive integer"))?;

        let chain = match &body["option_chain"] {
            Value::Array(items) => items.iter().cloned().map(RawQuote::from_value).collect(),
            _ => return Err(invalid("option_chain", "expected an array")),
        };

        let classify = match obj.get("classify") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(invalid("classify", "expected a boolean")),
        };

        Ok(OptionChainSnapshot {
            date,
            symbol,
            spot,
            strike_step,
            chain,
            classify,
        })
    }
}

fn invalid(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}
