use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use iv_ledger::config::{ServiceConfig, StoreConfig, StoreKind};
use iv_ledger::ledger::{LedgerSchema, LedgerStore};
use iv_ledger::model::Symbol;

mod cli;

fn schema(legacy: bool) -> LedgerSchema {
    if legacy {
        LedgerSchema::Legacy
    } else {
        LedgerSchema::Regime
    }
}

fn store_config(args: &cli::StoreArgs) -> Result<StoreConfig> {
    let kind: StoreKind = args.store.parse()?;
    StoreConfig::resolve(
        kind,
        args.ledger_dir.clone(),
        Duration::from_secs(args.timeout_secs),
    )
}

fn build_store(args: &cli::StoreArgs) -> Result<Arc<dyn LedgerStore>> {
    store_config(args)?.build()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Serve {
            host,
            port,
            cache_ttl_secs,
            store,
        } => {
            let config = ServiceConfig::new(
                host,
                port,
                store_config(&store)?,
                schema(store.legacy_schema),
                Duration::from_secs(cache_ttl_secs),
            );
            iv_ledger::api::serve(&config).await
        }
        cli::Command::Ingest {
            file,
            dry_run,
            store,
        } => {
            iv_ledger::ingest::run(&file, build_store(&store)?, schema(store.legacy_schema), dry_run)
                .await
        }
        cli::Command::Init {
            ledger_dir,
            legacy_schema,
        } => iv_ledger::init::run(&ledger_dir, schema(legacy_schema)).await,
        cli::Command::Show {
            symbol,
            rows,
            store,
        } => {
            let symbol: Symbol = symbol.parse()?;
            iv_ledger::show::run(symbol, build_store(&store)?, rows).await
        }
    }
}
