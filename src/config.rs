use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::ledger::{FileStore, GitHubStore, LedgerSchema, LedgerStore, github};

/// Which ledger backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    GitHub,
    File,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "github" => Ok(StoreKind::GitHub),
            "file" => Ok(StoreKind::File),
            other => bail!("Invalid store '{other}'. Use 'github' or 'file'."),
        }
    }
}

/// Fully resolved backend settings.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    GitHub {
        api_url: String,
        repo: String,
        branch: Option<String>,
        token: String,
        dir: String,
        timeout: Duration,
    },
    File {
        dir: PathBuf,
    },
}

impl StoreConfig {
    /// Resolve from CLI choices plus the process environment.
    pub fn resolve(kind: StoreKind, ledger_dir: PathBuf, timeout: Duration) -> Result<Self> {
        Self::resolve_with(kind, ledger_dir, timeout, |k| std::env::var(k).ok())
    }

    /// Like [`StoreConfig::resolve`] with an explicit variable lookup.
    ///
    /// GitHub: `GITHUB_TOKEN` and `GITHUB_REPO` are required;
    /// `GITHUB_BRANCH`, `GITHUB_API_URL` and `IV_LEDGER_DATA_DIR`
    /// (path prefix inside the repository, default `data`) are optional.
    pub fn resolve_with(
        kind: StoreKind,
        ledger_dir: PathBuf,
        timeout: Duration,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let var = |k: &str| env(k).filter(|v| !v.trim().is_empty());

        match kind {
            StoreKind::File => Ok(StoreConfig::File { dir: ledger_dir }),
            StoreKind::GitHub => {
                let (Some(token), Some(repo)) = (var("GITHUB_TOKEN"), var("GITHUB_REPO")) else {
                    bail!(
                        "GitHub environment variables not set. \
                         Set GITHUB_TOKEN and GITHUB_REPO (owner/name), or use --store file."
                    );
                };
                if !repo.contains('/') {
                    bail!("GITHUB_REPO must look like 'owner/name', got '{repo}'");
                }
                Ok(StoreConfig::GitHub {
                    api_url: var("GITHUB_API_URL").unwrap_or_else(|| github::DEFAULT_API_URL.to_string()),
                    repo,
                    branch: var("GITHUB_BRANCH"),
                    token,
                    dir: var("IV_LEDGER_DATA_DIR").unwrap_or_else(|| "data".to_string()),
                    timeout,
                })
            }
        }
    }

    pub fn build(&self) -> Result<Arc<dyn LedgerStore>> {
        let store: Arc<dyn LedgerStore> = match self {
            StoreConfig::File { dir } => Arc::new(FileStore::new(dir.clone())),
            StoreConfig::GitHub {
                api_url,
                repo,
                branch,
                token,
                dir,
                timeout,
            } => Arc::new(GitHubStore::new(
                api_url,
                repo,
                branch.clone(),
                token,
                dir,
                *timeout,
            )?),
        };
        Ok(store)
    }
}

/// Settings for the `serve` command.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub schema: LedgerSchema,
    pub cache_ttl: Duration,
    /// CORS origin; any origin when `None`.
    pub allowed_origin: Option<String>,
}

impl ServiceConfig {
    pub fn new(host: String, port: u16, store: StoreConfig, schema: LedgerSchema, cache_ttl: Duration) -> Self {
        Self {
            host,
            port,
            store,
            schema,
            cache_ttl,
            allowed_origin: std::env::var("IV_LEDGER_ALLOWED_ORIGIN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}
