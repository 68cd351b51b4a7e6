use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::model::Symbol;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger for {0} does not exist")]
    NotAvailable(Symbol),

    #[error("ledger for {0} changed since it was read")]
    Conflict(Symbol),

    #[error("ledger transport error: {0}")]
    Transport(String),
}

/// Opaque version of a stored ledger, handed back on write for the
/// compare-and-swap check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full ledger text as of one read.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub text: String,
    pub version: VersionToken,
}

/// Versioned whole-document storage for per-symbol ledgers.
///
/// `write` must fail with [`StoreError::Conflict`] when `version` is no
/// longer the current version of the document.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn read(&self, symbol: Symbol) -> Result<LedgerSnapshot, StoreError>;

    async fn write(
        &self,
        symbol: Symbol,
        text: &str,
        version: &VersionToken,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// In-process store; versions are a per-symbol write counter.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<Symbol, (String, u64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `(symbol, text)` documents at version 0.
    pub fn with_ledgers<I, S>(ledgers: I) -> Self
    where
        I: IntoIterator<Item = (Symbol, S)>,
        S: Into<String>,
    {
        let docs = ledgers
            .into_iter()
            .map(|(symbol, text)| (symbol, (text.into(), 0)))
            .collect();
        Self {
            docs: Mutex::new(docs),
        }
    }

    /// Current text of a ledger, if present.
    pub async fn text(&self, symbol: Symbol) -> Option<String> {
        self.docs.lock().await.get(&symbol).map(|(t, _)| t.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn read(&self, symbol: Symbol) -> Result<LedgerSnapshot, StoreError> {
        let docs = self.docs.lock().await;
        let (text, version) = docs.get(&symbol).ok_or(StoreError::NotAvailable(symbol))?;
        Ok(LedgerSnapshot {
            text: text.clone(),
            version: VersionToken(version.to_string()),
        })
    }

    async fn write(
        &self,
        symbol: Symbol,
        text: &str,
        version: &VersionToken,
        _message: &str,
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().await;
        let entry = docs.get_mut(&symbol).ok_or(StoreError::NotAvailable(symbol))?;
        if entry.1.to_string() != version.0 {
            return Err(StoreError::Conflict(symbol));
        }
        *entry = (text.to_string(), entry.1 + 1);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
