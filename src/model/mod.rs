pub mod num;
pub mod quote;
pub mod row;
pub mod snapshot;
pub mod symbol;

pub use quote::{QuoteParse, RawQuote, SelectedStrikeRow, SkipReason, StrikeQuote, try_parse_quote};
pub use row::LedgerRow;
pub use snapshot::{OptionChainSnapshot, ValidationError};
pub use symbol::Symbol;
