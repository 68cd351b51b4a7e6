use std::sync::Arc;

use anyhow::Result;

use crate::ledger::LedgerStore;
use crate::model::Symbol;
use crate::volatility::{HV_PERIOD, LedgerSeries};

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".to_string())
}

/// Render the last `rows` entries of a series as a text table.
pub fn render(series: &LedgerSeries, rows: usize) -> String {
    let start = series.len().saturating_sub(rows);
    let hv_label = format!("HV{HV_PERIOD}");
    let mut out = format!(
        "{:<12} {:>10} {:>8} {:>8} {:>8}  {}\n",
        "Date", "Spot", "AVG_IV", hv_label, "PCTL", "REGIME"
    );
    for i in start..series.len() {
        out.push_str(&format!(
            "{:<12} {:>10} {:>8} {:>8} {:>8}  {}\n",
            series.dates[i],
            cell(series.spot[i]),
            cell(series.avg_iv[i]),
            cell(series.hv[i]),
            cell(series.iv_percentile[i]),
            series.iv_regime[i].map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

/// CLI entry point for the `show` subcommand.
pub async fn run(symbol: Symbol, store: Arc<dyn LedgerStore>, rows: usize) -> Result<()> {
    let snapshot = store.read(symbol).await?;
    let series = LedgerSeries::from_ledger(symbol, &snapshot.text);

    if series.is_empty() {
        println!("{symbol}: ledger has no rows ({})", store.describe());
        return Ok(());
    }

    println!("{symbol}: {} row(s) in {}", series.len(), store.describe());
    print!("{}", render(&series, rows));
    Ok(())
}
