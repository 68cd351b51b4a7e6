use std::path::Path;

use anyhow::Result;

use crate::ledger::{FileStore, LedgerSchema};
use crate::model::Symbol;

/// CLI entry point for the `init` subcommand: header-only ledgers for every
/// symbol that does not have one yet.
pub async fn run(dir: &Path, schema: LedgerSchema) -> Result<()> {
    let store = FileStore::new(dir);
    for symbol in Symbol::ALL {
        let path = store.path(symbol);
        if store.init(symbol, schema).await? {
            println!("Created {}", path.display());
        } else {
            println!("Exists  {}", path.display());
        }
    }
    Ok(())
}
