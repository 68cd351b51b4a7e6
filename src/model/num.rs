//! Lenient numeric parsing for loosely-typed JSON input, plus the rounding
//! and rendering rules used when values are written to the ledger.

use serde_json::Value;

/// Parse a real from a JSON number or a numeric string.
///
/// Non-finite results (`"nan"`, `"inf"`) are rejected.
pub fn parse_real(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

/// Parse an integer from a JSON number or an integer string.
///
/// Real-valued JSON numbers are truncated toward zero; strings must be
/// integer literals.
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).ok()
            } else {
                n.as_f64().filter(|x| x.is_finite()).map(|x| x.trunc() as i64)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Round to two decimals.
///
/// Goes through the exact decimal expansion (`{:.2}`) instead of scaling by
/// 100, so values like 2.675 (stored as 2.67499...) round down the same way
/// the ledgers written so far were rounded.
pub fn round2(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{x:.2}").parse::<f64>().unwrap_or(x)
}

/// Render a real for the ledger: shortest round-trip digits, with a
/// trailing `.0` when the value is integral (`25020.0`, `12.1`).
pub fn format_real(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}
