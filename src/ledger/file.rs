use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::{LedgerSnapshot, LedgerStore, StoreError, VersionToken};
use super::{LedgerSchema, empty_ledger};
use crate::model::Symbol;

/// Ledgers as CSV files in a local directory. The version token is the
/// sha-256 of the file contents.
pub struct FileStore {
    dir: PathBuf,
    // Held across check-then-write so the compare-and-swap is atomic for
    // every writer inside this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, symbol: Symbol) -> PathBuf {
        self.dir.join(symbol.ledger_file())
    }

    /// Create a header-only ledger for `symbol` unless one exists.
    /// Returns whether a file was created.
    pub async fn init(&self, symbol: Symbol, schema: LedgerSchema) -> anyhow::Result<bool> {
        use anyhow::Context;

        let _guard = self.write_lock.lock().await;
        let path = self.path(symbol);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating ledger dir {}", self.dir.display()))?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e).with_context(|| format!("creating {}", path.display())),
        };
        let header = empty_ledger(schema)?;
        file.write_all(header.as_bytes())
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "initialized ledger");
        Ok(true)
    }

    async fn load(&self, symbol: Symbol) -> Result<Vec<u8>, StoreError> {
        let path = self.path(symbol);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotAvailable(symbol)),
            Err(e) => Err(StoreError::Transport(format!("reading {}: {e}", path.display()))),
        }
    }
}

fn content_version(bytes: &[u8]) -> VersionToken {
    VersionToken(format!("{:x}", Sha256::digest(bytes)))
}

#[async_trait]
impl LedgerStore for FileStore {
    async fn read(&self, symbol: Symbol) -> Result<LedgerSnapshot, StoreError> {
        let bytes = self.load(symbol).await?;
        let version = content_version(&bytes);
        let text = String::from_utf8(bytes)
            .map_err(|e| StoreError::Transport(format!("{} is not UTF-8: {e}", symbol.ledger_file())))?;
        Ok(LedgerSnapshot { text, version })
    }

    async fn write(
        &self,
        symbol: Symbol,
        text: &str,
        version: &VersionToken,
        message: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let current = content_version(&self.load(symbol).await?);
        if &current != version {
            return Err(StoreError::Conflict(symbol));
        }

        let path = self.path(symbol);
        let tmp = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| StoreError::Transport(format!("writing {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Transport(format!("renaming into {}: {e}", path.display())))?;

        debug!(path = %path.display(), change = message, "ledger written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}
