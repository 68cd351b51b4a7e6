use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::ledger::{LedgerSchema, LedgerStore, MemoryStore};
use crate::model::OptionChainSnapshot;
use crate::pipeline::{Pipeline, PipelineOutput};

/// Outcome of ingesting one snapshot file.
pub struct IngestReport {
    pub output: PipelineOutput,
    /// Ledger text that would have been committed, for dry runs.
    pub dry_run_ledger: Option<String>,
}

/// Run one snapshot JSON file through the pipeline.
///
/// With `dry_run` the real ledger is read once and the write goes to an
/// in-memory copy instead.
pub async fn ingest_file(
    file: &Path,
    store: Arc<dyn LedgerStore>,
    schema: LedgerSchema,
    dry_run: bool,
) -> Result<IngestReport> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading snapshot {}", file.display()))?;
    let body: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parsing snapshot {}", file.display()))?;
    let snapshot = OptionChainSnapshot::from_request(&body)?;

    if !dry_run {
        let output = Pipeline::new(store, schema).process(&snapshot).await?;
        return Ok(IngestReport {
            output,
            dry_run_ledger: None,
        });
    }

    let current = store.read(snapshot.symbol).await?;
    let scratch = Arc::new(MemoryStore::with_ledgers([(snapshot.symbol, current.text)]));
    let output = Pipeline::new(scratch.clone(), schema).process(&snapshot).await?;
    Ok(IngestReport {
        output,
        dry_run_ledger: scratch.text(snapshot.symbol).await,
    })
}

/// CLI entry point for the `ingest` subcommand.
pub async fn run(
    file: &Path,
    store: Arc<dyn LedgerStore>,
    schema: LedgerSchema,
    dry_run: bool,
) -> Result<()> {
    let report = ingest_file(file, store, schema, dry_run).await?;
    println!("{}", serde_json::to_string_pretty(&report.output)?);

    if let Some(ledger) = report.dry_run_ledger {
        let rows = ledger.lines().count().saturating_sub(1);
        println!("Dry run: ledger not committed ({rows} row(s) after upsert). Last line:");
        if let Some(last) = ledger.lines().last() {
            println!("  {last}");
        }
    }
    Ok(())
}
