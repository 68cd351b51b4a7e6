//! The per-symbol CSV ledger: canonical header, replace-or-append upsert,
//! and history extraction.
//!
//! Existing rows are treated as opaque records. Only their first two
//! fields (the `(Date, Symbol)` key) and, for history, the `AVG_IV` column
//! are ever looked at; everything else is carried through as read.

pub mod file;
pub mod github;
pub mod store;

use thiserror::Error;

use crate::model::LedgerRow;

pub use file::FileStore;
pub use github::GitHubStore;
pub use store::{LedgerSnapshot, LedgerStore, MemoryStore, StoreError, VersionToken};

const BASE_HEADER: [&str; 9] = [
    "Date", "Symbol", "Spot", "Strike", "CE_IV", "PE_IV", "AVG_IV", "CE_OI", "PE_OI",
];
const REGIME_COLUMNS: [&str; 2] = ["IV_PERCENTILE", "IV_REGIME"];

/// Zero-based position of `AVG_IV`; the same in every schema version.
pub const AVG_IV_COLUMN: usize = 6;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ledger output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Column layout version. Upserts always rewrite the header to the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerSchema {
    /// The nine base columns.
    Legacy,
    /// Base columns plus `IV_PERCENTILE` and `IV_REGIME`.
    #[default]
    Regime,
}

impl LedgerSchema {
    pub fn header(&self) -> Vec<&'static str> {
        let mut cols = BASE_HEADER.to_vec();
        if *self == LedgerSchema::Regime {
            cols.extend(REGIME_COLUMNS);
        }
        cols
    }

    pub fn record(&self, row: &LedgerRow) -> Vec<String> {
        let mut fields = row.base_fields();
        if *self == LedgerSchema::Regime {
            fields.extend(row.regime_fields());
        }
        fields
    }
}

/// Parse ledger text into records, header included.
///
/// Leading/trailing whitespace is ignored, blank lines are dropped, and
/// records the reader cannot decode are skipped.
pub fn parse_records(text: &str) -> Vec<csv::StringRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.trim().as_bytes());

    reader.records().filter_map(Result::ok).collect()
}

/// Data records only (the first record is taken to be a header).
pub fn data_records(text: &str) -> Vec<csv::StringRecord> {
    parse_records(text).into_iter().skip(1).collect()
}

fn has_key(record: &csv::StringRecord, date: &str, symbol: &str) -> bool {
    record.len() >= 2 && record.get(0) == Some(date) && record.get(1) == Some(symbol)
}

/// Header-only ledger text for `schema`.
pub fn empty_ledger(schema: LedgerSchema) -> Result<String, LedgerError> {
    write_ledger(schema, std::iter::empty(), None)
}

/// Rewrite `text` with `row` as its last line.
///
/// The canonical header for `schema` replaces whatever header was there.
/// Rows with the same `(Date, Symbol)` as `row` are dropped; all other rows
/// keep their order and fields.
pub fn upsert(text: &str, row: &LedgerRow, schema: LedgerSchema) -> Result<String, LedgerError> {
    let (date, symbol) = row.key();
    let kept = data_records(text)
        .into_iter()
        .filter(|r| !has_key(r, date, symbol));

    write_ledger(schema, kept, Some(schema.record(row)))
}

fn write_ledger(
    schema: LedgerSchema,
    rows: impl Iterator<Item = csv::StringRecord>,
    last: Option<Vec<String>>,
) -> Result<String, LedgerError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(schema.header())?;
    for record in rows {
        writer.write_record(&record)?;
    }
    if let Some(fields) = last {
        writer.write_record(&fields)?;
    }

    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// `AVG_IV` values in ledger order, excluding the row keyed
/// `(date, symbol)` and any row whose `AVG_IV` is not a finite number.
pub fn avg_iv_history(text: &str, date: &str, symbol: &str) -> Vec<f64> {
    data_records(text)
        .iter()
        .filter(|r| !has_key(r, date, symbol))
        .filter_map(|r| r.get(AVG_IV_COLUMN)?.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect()
}
