use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ATM implied-volatility ledger: ingest option-chain snapshots, rank the
/// ATM IV against recent history, and keep a per-symbol CSV ledger.
#[derive(Parser)]
#[command(name = "iv-ledger", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where ledgers are read from and committed to.
#[derive(Args, Clone)]
pub struct StoreArgs {
    /// Ledger backend: github (contents API, needs GITHUB_TOKEN/GITHUB_REPO) or file
    #[arg(long, default_value = "github")]
    pub store: String,

    /// Directory holding ledger CSVs for the file backend
    #[arg(long, default_value = "data")]
    pub ledger_dir: PathBuf,

    /// HTTP timeout for the github backend, in seconds
    #[arg(long, default_value = "15")]
    pub timeout_secs: u64,

    /// Write the nine-column ledger without IV_PERCENTILE / IV_REGIME
    #[arg(long)]
    pub legacy_schema: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value = "8080")]
        port: u16,

        /// How long ledger series stay cached for the read endpoints, in seconds
        #[arg(long, default_value = "300")]
        cache_ttl_secs: u64,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Process one option-chain snapshot JSON file and commit the ledger row
    Ingest {
        /// Path to the snapshot JSON (same body as POST /process-option-chain)
        file: PathBuf,

        /// Compute and print the result without committing the ledger
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Create header-only ledgers in a local directory
    Init {
        #[arg(long, default_value = "data")]
        ledger_dir: PathBuf,

        /// Use the nine-column header
        #[arg(long)]
        legacy_schema: bool,
    },

    /// Print the tail of a ledger with realized volatility alongside IV
    Show {
        /// NIFTY or BANKNIFTY
        symbol: String,

        /// Number of most recent rows to print
        #[arg(long, default_value = "20")]
        rows: usize,

        #[command(flatten)]
        store: StoreArgs,
    },
}
