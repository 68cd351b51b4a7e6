//! ATM strike selection.
//!
//! The exact ATM strike often has no quoted IV on one leg (near the open,
//! or on illiquid series), so selection falls back to the nearest strike
//! where both legs are quoted.

use tracing::debug;

use crate::model::{QuoteParse, RawQuote, SelectedStrikeRow, try_parse_quote};

/// `round(spot / strike_step) * strike_step`, or `None` when the result
/// does not fit in an `i64`.
///
/// The quotient is rounded half-to-even: 25025 / 50 = 500.5 → 500, while
/// 25075 / 50 = 501.5 → 502. Ledgers written so far use this rule, so a
/// half-up rule would shift the ATM on exact midpoints.
pub fn theoretical_atm(spot: f64, strike_step: i64) -> Option<i64> {
    let steps = (spot / strike_step as f64).round_ties_even();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if !steps.is_finite() || steps.abs() >= i64::MAX as f64 {
        return None;
    }
    (steps as i64).checked_mul(strike_step)
}

/// Pick the usable quote nearest to `atm`.
///
/// Candidates are quotes whose strike parses and whose CE and PE IV are
/// both present. Among equidistant candidates the first one in chain order
/// wins. `None` when the chain has no candidate at all.
pub fn select_strike(chain: &[RawQuote], atm: i64) -> Option<SelectedStrikeRow> {
    let mut best: Option<(u64, SelectedStrikeRow)> = None;
    let mut skipped = 0usize;

    for raw in chain {
        let quote = match try_parse_quote(raw) {
            QuoteParse::Quote(q) => q,
            QuoteParse::Skip(reason) => {
                debug!(?reason, "skipping chain entry");
                skipped += 1;
                continue;
            }
        };
        let Some(candidate) = quote.as_candidate() else {
            skipped += 1;
            continue;
        };

        let distance = candidate.strike.abs_diff(atm);
        match &best {
            Some((d, _)) if *d <= distance => {}
            _ => best = Some((distance, candidate)),
        }
    }

    if skipped > 0 {
        debug!(skipped, total = chain.len(), "chain entries without usable IV");
    }

    best.map(|(_, row)| row)
}
