use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Underlying index whose ATM IV is tracked. Each symbol owns one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Nifty,
    BankNifty,
}

impl Symbol {
    pub const ALL: [Symbol; 2] = [Symbol::Nifty, Symbol::BankNifty];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Nifty => "NIFTY",
            Symbol::BankNifty => "BANKNIFTY",
        }
    }

    /// File name of this symbol's ledger, relative to the ledger directory.
    pub fn ledger_file(&self) -> &'static str {
        match self {
            Symbol::Nifty => "nifty_iv_log.csv",
            Symbol::BankNifty => "banknifty_iv_log.csv",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported symbol: {0}")]
pub struct UnknownSymbol(pub String);

impl FromStr for Symbol {
    type Err = UnknownSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NIFTY" => Ok(Symbol::Nifty),
            "BANKNIFTY" => Ok(Symbol::BankNifty),
            _ => Err(UnknownSymbol(s.to_string())),
        }
    }
}
